use crate::{CaseError, CaseSettings};

pub const MIN_REFRESH_INTERVAL_MS: u64 = 100;
pub const MAX_REFRESH_INTERVAL_MS: u64 = 60_000;
const MIN_PLOT_SIZE: u32 = 200;

pub fn normalize_case_settings(mut settings: CaseSettings) -> Result<CaseSettings, CaseError> {
    if settings.log_file.trim().is_empty() {
        return Err(CaseError::Invalid("log_file must not be empty".to_string()));
    }
    settings.log_file = settings.log_file.trim().to_string();
    settings.refresh_interval_ms = settings
        .refresh_interval_ms
        .clamp(MIN_REFRESH_INTERVAL_MS, MAX_REFRESH_INTERVAL_MS);
    settings.tracked_variables = normalize_variables(settings.tracked_variables);
    settings.plot.width = settings.plot.width.max(MIN_PLOT_SIZE);
    settings.plot.height = settings.plot.height.max(MIN_PLOT_SIZE);
    settings.plot.line_width = settings.plot.line_width.max(1);
    if let Some(command) = &settings.command {
        if command.program.trim().is_empty() {
            return Err(CaseError::Invalid(
                "command.program must not be empty".to_string(),
            ));
        }
    }
    Ok(settings)
}

/// Parses a comma separated variable list such as `p_rgh, alpha.water`.
pub fn parse_variable_list(raw: &str) -> Vec<String> {
    normalize_variables(raw.split(',').map(str::to_string).collect())
}

fn normalize_variables(variables: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(variables.len());
    for name in variables {
        let name = name.trim();
        if name.is_empty() || out.iter().any(|existing| existing == name) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_interval_is_clamped() {
        let settings = CaseSettings {
            refresh_interval_ms: 5,
            ..CaseSettings::default()
        };
        let settings = normalize_case_settings(settings).expect("normalize");
        assert_eq!(settings.refresh_interval_ms, MIN_REFRESH_INTERVAL_MS);
    }

    #[test]
    fn empty_log_file_is_rejected() {
        let settings = CaseSettings {
            log_file: "  ".to_string(),
            ..CaseSettings::default()
        };
        assert!(matches!(
            normalize_case_settings(settings),
            Err(CaseError::Invalid(_))
        ));
    }

    #[test]
    fn variable_list_is_trimmed_and_deduplicated() {
        assert_eq!(
            parse_variable_list(" p_rgh, alpha.water,,p_rgh "),
            vec!["p_rgh".to_string(), "alpha.water".to_string()]
        );
    }
}
