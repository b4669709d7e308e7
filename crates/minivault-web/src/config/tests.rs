#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_select_stub_backend() {
        let config = Config::default();
        assert_eq!(config.llm_service, BackendConfig::Stubbed);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.max_prompt_chars, 8192);
        assert_eq!(config.audit.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.llm_service, BackendConfig::Stubbed);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_toml_selects_ollama() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [llm_service]
            type = "ollama"
            model = "llama3:8b"

            [audit]
            log_dir = "/var/log/minivault"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.remote_summary(),
            Some(("http://localhost:11434".to_string(), "llama3:8b".to_string()))
        );
        assert_eq!(config.audit.log_dir, PathBuf::from("/var/log/minivault"));
    }

    #[test]
    fn test_unknown_backend_type_in_toml_fails() {
        assert!(Config::from_toml("[llm_service]\ntype = \"gpt\"\n").is_err());
    }

    #[test]
    fn test_env_switches_to_ollama_with_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("MINIVAULT_LLM_SERVICE__TYPE", "ollama"),
                ("MINIVAULT_LLM_SERVICE__MODEL", "mistral"),
                ("MINIVAULT_LLM_SERVICE__BASE_URL", "http://ollama:11434"),
            ]))
            .unwrap();
        assert_eq!(
            config.llm_service,
            BackendConfig::Ollama {
                base_url: "http://ollama:11434".to_string(),
                model: "mistral".to_string(),
                timeout_secs: 120,
            }
        );
    }

    #[test]
    fn test_env_type_ollama_keeps_file_parameters() {
        let mut config = Config::from_toml("[llm_service]\ntype = \"ollama\"\nmodel = \"phi3\"\n").unwrap();
        config.apply_env(env(&[("MINIVAULT_LLM_SERVICE__TYPE", "ollama")])).unwrap();
        assert_eq!(config.remote_summary().map(|(_, m)| m), Some("phi3".to_string()));
    }

    #[test]
    fn test_env_model_ignored_for_stub() {
        let mut config = Config::default();
        config.apply_env(env(&[("MINIVAULT_LLM_SERVICE__MODEL", "mistral")])).unwrap();
        assert_eq!(config.llm_service, BackendConfig::Stubbed);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("MINIVAULT_LLM_SERVICE__TYPE", "openai")])).unwrap_err();
        assert!(matches!(err, MinivaultError::Config(_)));

        let err = config.apply_env(env(&[("MINIVAULT_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("MINIVAULT_PORT"));
    }

    #[test]
    fn test_bind_addr() {
        let mut config = Config::default();
        config.apply_env(env(&[("MINIVAULT_HOST", "0.0.0.0"), ("MINIVAULT_PORT", "8080")])).unwrap();
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:8080");
    }
}
