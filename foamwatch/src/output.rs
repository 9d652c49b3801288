pub fn print_info(message: &str) {
    println!("[foamwatch][INFO] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[foamwatch][ERROR]: {message}");
}
