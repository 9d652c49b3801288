//! Line patterns for solver logs.
//!
//! Every function here is a pure function of one line of text. Lines that do
//! not match, or whose numeric groups do not parse, yield `None`.

use regex::Regex;

const NUMBER: &str = r"[0-9.eE+-]+";

/// A `Time = <value>[s]` marker.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeMarker {
    pub value: f64,
    /// Text as printed by the solver, unit suffix included.
    pub label: String,
}

/// Initial residual of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualMatch {
    pub solver: Option<String>,
    pub variable: String,
    pub initial: f64,
    /// Time token carried on the same line, if any.
    pub time: Option<TimeMarker>,
}

/// Linear-solver summary of one solve: routed to the profiling log.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverPerformance {
    pub solver: Option<String>,
    pub variable: String,
    pub final_residual: Option<f64>,
    pub iterations: u32,
}

/// Everything one line contributed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLine {
    pub time: Option<TimeMarker>,
    pub residual: Option<ResidualMatch>,
    pub performance: Option<SolverPerformance>,
    pub diagnostic: Option<f64>,
    pub delta_t: Option<f64>,
    pub clock: bool,
}

impl ParsedLine {
    pub fn is_empty(&self) -> bool {
        self.time.is_none()
            && self.residual.is_none()
            && self.performance.is_none()
            && self.diagnostic.is_none()
            && self.delta_t.is_none()
            && !self.clock
    }
}

pub struct PatternRegistry {
    time: Regex,
    residual: Regex,
    solving_for: Regex,
    final_residual: Regex,
    delta_t: Regex,
    diagnostic_primary: Regex,
    diagnostic_secondary: Regex,
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self {
            time: compile(&format!(r"^\s*Time\s*=\s*({NUMBER})\s*(s?)\s*$")),
            residual: compile(&format!(
                r"(?:^\s*Time\s*=\s*(?P<time>{NUMBER})(?P<unit>s?)[\s,;|]+)?(?:(?P<solver>[A-Za-z][A-Za-z0-9_]*):?\s+)?Solving for (?P<var>[A-Za-z0-9_.:]+), Initial residual = (?P<value>{NUMBER})"
            )),
            solving_for: compile(
                r"(?:(?P<solver>[A-Za-z][A-Za-z0-9_]*):?\s+)?Solving for (?P<var>[A-Za-z0-9_.:]+)",
            ),
            final_residual: compile(&format!(r"Final residual = ({NUMBER})")),
            delta_t: compile(&format!(r"\bdeltaT\s*=\s*({NUMBER})")),
            diagnostic_primary: compile(&format!(
                r"particles fraction, min, max = .+ ({NUMBER})"
            )),
            diagnostic_secondary: compile(&format!(
                r"Max cell volume fraction\s*=\s*({NUMBER})"
            )),
        }
    }

    /// Runs every pattern family over `line`.
    pub fn parse_line(&self, line: &str) -> ParsedLine {
        ParsedLine {
            time: self.match_time(line),
            residual: self.match_residual(line),
            performance: self.match_solver_performance(line),
            diagnostic: self.match_diagnostic(line),
            delta_t: self.match_delta_t(line),
            clock: is_clock_line(line),
        }
    }

    pub fn match_time(&self, line: &str) -> Option<TimeMarker> {
        let caps = self.time.captures(line)?;
        let number = caps.get(1)?.as_str();
        let unit = caps.get(2).map_or("", |m| m.as_str());
        Some(TimeMarker {
            value: parse_number(number)?,
            label: format!("{number}{unit}"),
        })
    }

    pub fn match_residual(&self, line: &str) -> Option<ResidualMatch> {
        let caps = self.residual.captures(line)?;
        let initial = parse_number(caps.name("value")?.as_str())?;
        let time = match caps.name("time") {
            Some(number) => {
                let unit = caps.name("unit").map_or("", |m| m.as_str());
                Some(TimeMarker {
                    value: parse_number(number.as_str())?,
                    label: format!("{}{unit}", number.as_str()),
                })
            }
            None => None,
        };
        Some(ResidualMatch {
            solver: caps.name("solver").map(|m| m.as_str().to_string()),
            variable: caps.name("var")?.as_str().to_string(),
            initial,
            time,
        })
    }

    /// Matches lines carrying "Solving for", "Final residual" and "No Iterations".
    pub fn match_solver_performance(&self, line: &str) -> Option<SolverPerformance> {
        if !(line.contains("Solving for")
            && line.contains("Final residual")
            && line.contains("No Iterations"))
        {
            return None;
        }
        let iterations = line
            .split(',')
            .find(|field| field.contains("No Iterations"))?
            .split_whitespace()
            .last()?
            .parse::<u32>()
            .ok()?;
        let caps = self.solving_for.captures(line)?;
        let final_residual = self
            .final_residual
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_number(m.as_str()));
        Some(SolverPerformance {
            solver: caps.name("solver").map(|m| m.as_str().to_string()),
            variable: caps.name("var")?.as_str().to_string(),
            final_residual,
            iterations,
        })
    }

    /// Maximum phase fraction. The secondary pattern is only tried when the
    /// primary one yields nothing.
    pub fn match_diagnostic(&self, line: &str) -> Option<f64> {
        first_number(&self.diagnostic_primary, line)
            .or_else(|| first_number(&self.diagnostic_secondary, line))
    }

    pub fn match_delta_t(&self, line: &str) -> Option<f64> {
        first_number(&self.delta_t, line)
    }
}

pub fn is_clock_line(line: &str) -> bool {
    line.contains("ExecutionTime") || line.contains("ClockTime")
}

fn first_number(pattern: &Regex, line: &str) -> Option<f64> {
    let caps = pattern.captures(line)?;
    parse_number(caps.get(1)?.as_str())
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in log pattern must compile")
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMG_LINE: &str = "GAMG:  Solving for p_rgh, Initial residual = 1.0e-02, Final residual = 1.0e-06, No Iterations 3";

    #[test]
    fn time_marker_keeps_label_and_strips_unit() {
        let registry = PatternRegistry::new();
        let marker = registry.match_time("Time = 0.25s").expect("time");
        assert_eq!(marker.value, 0.25);
        assert_eq!(marker.label, "0.25s");

        let marker = registry.match_time("Time = 0.5 s").expect("spaced unit");
        assert_eq!(marker.value, 0.5);
        assert_eq!(marker.label, "0.5s");
        assert!(registry.match_time("Time = 0.5 sec").is_none());

        let marker = registry.match_time("Time = 1e-03").expect("time");
        assert_eq!(marker.value, 1e-3);
        assert_eq!(marker.label, "1e-03");
    }

    #[test]
    fn execution_time_is_not_a_time_marker() {
        let registry = PatternRegistry::new();
        let line = "ExecutionTime = 1.24 s  ClockTime = 2 s";
        assert!(registry.match_time(line).is_none());
        assert!(registry.parse_line(line).clock);
    }

    #[test]
    fn residual_extracts_variable_and_value() {
        let registry = PatternRegistry::new();
        let residual = registry.match_residual(GAMG_LINE).expect("residual");
        assert_eq!(residual.solver.as_deref(), Some("GAMG"));
        assert_eq!(residual.variable, "p_rgh");
        assert_eq!(residual.initial, 1.0e-2);
        assert!(residual.time.is_none());
    }

    #[test]
    fn residual_accepts_dotted_names_and_signed_exponents() {
        let registry = PatternRegistry::new();
        let line = "smoothSolver:  Solving for alpha.water, Initial residual = 2.5E+00, Final residual = 1e-9, No Iterations 1";
        let residual = registry.match_residual(line).expect("residual");
        assert_eq!(residual.variable, "alpha.water");
        assert_eq!(residual.initial, 2.5);

        let untagged = registry
            .match_residual("Solving for k.water, Initial residual = 3.1e-05")
            .expect("untagged residual");
        assert_eq!(untagged.solver, None);
        assert_eq!(untagged.variable, "k.water");
    }

    #[test]
    fn residual_with_embedded_time_token() {
        let registry = PatternRegistry::new();
        let line = "Time = 0.5s, DILUPBiCGStab: Solving for Ux, Initial residual = 0.01, Final residual = 1e-6, No Iterations 2";
        let residual = registry.match_residual(line).expect("residual");
        let time = residual.time.expect("embedded time");
        assert_eq!(time.value, 0.5);
        assert_eq!(time.label, "0.5s");
        assert_eq!(residual.variable, "Ux");
    }

    #[test]
    fn malformed_numbers_are_skipped() {
        let registry = PatternRegistry::new();
        assert!(registry
            .match_residual("Solving for p, Initial residual = NaNgarbage")
            .is_none());
        assert!(registry
            .match_residual("Solving for p, Initial residual = 1.2.3")
            .is_none());
        assert!(registry.match_time("Time = 1e999").is_none());
        assert!(registry.parse_line("Solving for p, Initial residual = NaNgarbage").is_empty());
    }

    #[test]
    fn solver_performance_reads_iteration_count() {
        let registry = PatternRegistry::new();
        let perf = registry.match_solver_performance(GAMG_LINE).expect("performance");
        assert_eq!(perf.variable, "p_rgh");
        assert_eq!(perf.iterations, 3);
        assert_eq!(perf.final_residual, Some(1.0e-6));
        assert!(registry
            .match_solver_performance("GAMG:  Solving for p, Initial residual = 1")
            .is_none());
    }

    #[test]
    fn diagnostic_prefers_primary_pattern() {
        let registry = PatternRegistry::new();
        assert_eq!(
            registry.match_diagnostic("Cloud: particles fraction, min, max = 0 0.05 0.63"),
            Some(0.63)
        );
        assert_eq!(
            registry.match_diagnostic("Max cell volume fraction = 4.2e-01"),
            Some(0.42)
        );
        assert_eq!(registry.match_diagnostic("Courant Number mean: 0.1 max: 0.5"), None);
    }

    #[test]
    fn delta_t_is_extracted() {
        let registry = PatternRegistry::new();
        assert_eq!(registry.match_delta_t("deltaT = 0.00119048"), Some(0.00119048));
        assert_eq!(registry.match_delta_t("maxDeltaT = 1"), None);
    }
}
