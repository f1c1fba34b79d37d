fn main() {
    holiday_cli::set_version(
        option_env!("HOLIDAY_VERSION").unwrap_or(env!("CARGO_PKG_VERSION")),
        option_env!("HOLIDAY_COMMIT").unwrap_or("none"),
        option_env!("HOLIDAY_BUILD_DATE").unwrap_or("unknown"),
    );
    let code = holiday_cli::run_from_env();
    std::process::exit(code);
}
