pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns `name/version` for user agents and startup logs.
pub fn versioned_name(name: &str) -> String {
    format!("{name}/v{APP_VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_name_includes_package_version() {
        assert_eq!(
            versioned_name("light-client"),
            format!("light-client/v{APP_VERSION}")
        );
    }
}
