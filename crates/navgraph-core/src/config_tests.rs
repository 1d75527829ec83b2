//! Tests for config module

#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::error::Error;
    use crate::metric::MetricKind;
    use crate::scalar::ScalarKind;

    // ========================================================================
    // Defaults
    // ========================================================================

    #[test]
    fn test_config_default_values() {
        // Arrange & Act
        let config = IndexConfig::default();

        // Assert
        assert_eq!(config.metric, MetricKind::Ip);
        assert_eq!(config.scalar, ScalarKind::F32);
        assert_eq!(config.connectivity, 16);
        assert_eq!(config.expansion_add, 128);
        assert_eq!(config.expansion_search, 64);
        assert_eq!(config.threads_add, 0);
    }

    #[test]
    fn test_config_builder_methods() {
        let config = IndexConfig::new(MetricKind::L2sq, ScalarKind::F16, 3)
            .with_connectivity(8)
            .with_expansion(40, 20)
            .with_capacity(100)
            .with_threads(2, 4)
            .with_seed(7);

        assert_eq!(config.dimensions, 3);
        assert_eq!(config.connectivity, 8);
        assert_eq!(config.expansion_add, 40);
        assert_eq!(config.expansion_search, 20);
        assert_eq!(config.capacity, 100);
        assert_eq!(config.effective_threads_add(), 2);
        assert_eq!(config.effective_threads_search(), 4);
        assert_eq!(config.seed, 7);
        assert_eq!(config.vector_bytes(), 6);
    }

    #[test]
    fn test_zero_threads_means_hardware_parallelism() {
        let config = IndexConfig::default();
        assert!(config.effective_threads_add() >= 1);
        assert!(config.effective_threads_search() >= 1);
    }

    // ========================================================================
    // TOML
    // ========================================================================

    #[test]
    fn test_config_from_toml() {
        // Arrange
        let toml = r#"
            metric = "cos"
            scalar = "f8"
            dimensions = 128
            connectivity = 32
        "#;

        // Act
        let config = IndexConfig::from_toml(toml).expect("parse");

        // Assert
        assert_eq!(config.metric, MetricKind::Cos);
        assert_eq!(config.scalar, ScalarKind::F8);
        assert_eq!(config.dimensions, 128);
        assert_eq!(config.connectivity, 32);
        // untouched fields keep defaults
        assert_eq!(config.expansion_search, 64);
    }

    #[test]
    fn test_config_from_toml_rejects_unknown_metric() {
        let result = IndexConfig::from_toml(r#"metric = "manhattan""#);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_to_toml_round_trip() {
        let config = IndexConfig::new(MetricKind::Hamming, ScalarKind::B1, 256).with_capacity(10);

        let toml = config.to_toml().expect("serialize");
        let parsed = IndexConfig::from_toml(&toml).expect("parse");

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = IndexConfig::load_from_path(dir.path().join("absent.toml")).expect("load");
        assert_eq!(config.connectivity, IndexConfig::default().connectivity);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("navgraph.toml");
        std::fs::write(&path, "dimensions = 4\nmetric = \"l2sq\"\n").expect("write");

        let config = IndexConfig::load_from_path(&path).expect("load");

        assert_eq!(config.dimensions, 4);
        assert_eq!(config.metric, MetricKind::L2sq);
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_validate_accepts_sane_config() {
        let config = IndexConfig::new(MetricKind::Cos, ScalarKind::F32, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        let config = IndexConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn test_validate_rejects_tiny_connectivity() {
        let config = IndexConfig::new(MetricKind::Cos, ScalarKind::F32, 4).with_connectivity(1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connectivity"));
    }

    #[test]
    fn test_validate_rejects_zero_expansion() {
        let config = IndexConfig::new(MetricKind::Cos, ScalarKind::F32, 4).with_expansion(0, 10);
        assert!(config.validate().is_err());

        let config = IndexConfig::new(MetricKind::Cos, ScalarKind::F32, 4).with_expansion(10, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_metric_surfaces_combination_errors() {
        let config = IndexConfig::new(MetricKind::Hamming, ScalarKind::F32, 4);
        assert!(matches!(
            config.resolve_metric(),
            Err(Error::UnsupportedCombination { .. })
        ));
    }
}
