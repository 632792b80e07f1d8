//! End-to-end config parsing: an empty TOML document must produce a fully
//! defaulted, valid configuration, and partial documents must only override
//! what they mention.

use mn_domain::config::{Config, ConfigSeverity};

#[test]
fn empty_config_is_fully_defaulted() {
    let cfg: Config = toml::from_str("").unwrap();
    assert_eq!(cfg.server.port, 8000);
    assert_eq!(cfg.chat.history_limit, 10);
    assert_eq!(cfg.chat.retrieval_top_k, 3);
    assert_eq!(cfg.knowledge.chunk_size, 500);
    assert_eq!(cfg.knowledge.chunk_overlap, 50);
    assert_eq!(cfg.knowledge.embedding_model, "BAAI/bge-m3");
    assert!(cfg.observability.otlp_endpoint.is_none());
    assert!(cfg.llm.providers.is_empty());
}

#[test]
fn empty_config_validates_with_provider_warning_only() {
    let cfg: Config = toml::from_str("").unwrap();
    let issues = cfg.validate();
    assert!(issues
        .iter()
        .all(|i| i.severity == ConfigSeverity::Warning));
    assert!(issues.iter().any(|i| i.field == "llm.providers"));
    assert!(cfg.is_valid());
}

#[test]
fn partial_config_overrides_only_named_fields() {
    let cfg: Config = toml::from_str(
        r#"
        [server]
        port = 9100

        [chat]
        history_limit = 4

        [[llm.providers]]
        id = "deepseek"
        kind = "openai_compat"
        base_url = "https://api.deepseek.com/v1"
        default_model = "deepseek-chat"

        [llm.providers.auth]
        env = "DEEPSEEK_API_KEY"

        [llm.roles]
        executor = "deepseek/deepseek-chat"
        embedder = "siliconflow/BAAI/bge-m3"
        "#,
    )
    .unwrap();

    assert_eq!(cfg.server.port, 9100);
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.chat.history_limit, 4);
    assert_eq!(cfg.chat.retrieval_top_k, 3);
    assert_eq!(cfg.llm.providers.len(), 1);
    assert_eq!(cfg.llm.providers[0].id, "deepseek");
    assert_eq!(
        cfg.llm.roles.get("executor").map(String::as_str),
        Some("deepseek/deepseek-chat")
    );
    assert!(cfg.validate().is_empty());
}

#[test]
fn invalid_chunk_overlap_is_a_hard_error() {
    let cfg: Config = toml::from_str(
        r#"
        [knowledge]
        chunk_size = 100
        chunk_overlap = 100
        "#,
    )
    .unwrap();
    assert!(!cfg.is_valid());
    assert!(cfg
        .validate()
        .iter()
        .any(|i| i.field == "knowledge.chunk_overlap" && i.severity == ConfigSeverity::Error));
}

#[test]
fn zero_top_k_is_rejected() {
    let cfg: Config = toml::from_str(
        r#"
        [chat]
        retrieval_top_k = 0
        "#,
    )
    .unwrap();
    assert!(!cfg.is_valid());
}
