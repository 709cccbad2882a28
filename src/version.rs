const fn unwrap_or_cargo_version(opt: Option<&'static str>) -> &'static str {
    match opt {
        Some(val) => val,
        None => env!("CARGO_PKG_VERSION"),
    }
}

/// Build-time `SITEWATCH_VERSION` when set, otherwise the crate version.
pub const VERSION: &str = unwrap_or_cargo_version(option_env!("SITEWATCH_VERSION"));
