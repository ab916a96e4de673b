use liminal_connections::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    unsafe {
        env::remove_var("LIMINAL_PROFILE");
        env::remove_var("LIMINAL_LOG_LEVEL");
        env::remove_var("LIMINAL_LOG_FORMAT");
        env::remove_var("LIMINAL_CONNECTION_PROD_TENANT_NAME");
        env::remove_var("LIMINAL_CONNECTION_PROD_API_CLIENT_SECRET");
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.log_format, "json");
    assert!(cfg.connections.is_empty());
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "LIMINAL_LOG_LEVEL=warn\n");
    write_env_file(&temp_dir, ".env.test", "LIMINAL_LOG_LEVEL=error\n");
    write_env_file(&temp_dir, ".env.test.local", "LIMINAL_LOG_LEVEL=trace\n");

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "LIMINAL_PROFILE=test\nLIMINAL_LOG_LEVEL=debug\n",
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.log_level, "trace");
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "LIMINAL_CONNECTION_PROD_TENANT_NAME=acme\nLIMINAL_LOG_FORMAT=json\n",
    );

    unsafe {
        env::set_var("LIMINAL_LOG_FORMAT", "pretty");
        env::set_var("LIMINAL_CONNECTION_PROD_TENANT_NAME", "acme-eu");
    }

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with env override");
    assert_eq!(cfg.log_format, "pretty");
    assert_eq!(
        cfg.connections.get("acme-eu").unwrap().current_revision_id_var_name(),
        "acme_eu_CURRENT_REVISION_ID"
    );
    assert!(cfg.connections.get("acme").is_err());

    clear_env();
}

#[test]
fn connection_groups_are_parsed() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        concat!(
            "LIMINAL_CONNECTION_PROD_TENANT_NAME=acme\n",
            "LIMINAL_CONNECTION_PROD_TENANT_ALIAS=prod\n",
            "LIMINAL_CONNECTION_PROD_API_CLIENT_ID=client-id\n",
            "LIMINAL_CONNECTION_PROD_API_CLIENT_SECRET=client-secret\n",
            "LIMINAL_CONNECTION_PROD_REGISTRY_ID=src_42\n",
            "LIMINAL_CONNECTION_TEST_TENANT_NAME=acme-test\n",
            "LIMINAL_CONNECTION_TEST_CURRENT_REVISION_ID_VAR_NAME=TEST_REV\n",
            "UNRELATED_CONNECTION_X_TENANT_NAME=ignored\n",
        ),
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads connections");

    assert_eq!(cfg.connections.len(), 2);

    let prod = cfg.connections.get("prod").unwrap();
    assert_eq!(prod.tenant_name(), "acme");
    assert_eq!(prod.current_revision_id_var_name(), "prod_CURRENT_REVISION_ID");
    assert_eq!(prod.registry_id(), Some("src_42"));
    assert_eq!(prod.api_credentials().unwrap().1.expose(), "client-secret");

    let test = cfg.connections.get("acme-test").unwrap();
    assert_eq!(test.current_revision_id_var_name(), "TEST_REV");

    let json = cfg.redacted_json().unwrap();
    assert!(!json.contains("client-secret"));
    clear_env();
}

#[test]
fn connection_without_tenant_name_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "LIMINAL_CONNECTION_BROKEN_TENANT_ALIAS=orphan\n",
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("connection without tenant name should fail");
    assert!(matches!(err, ConfigError::Connection { ref key, .. } if key == "broken"));
    assert!(format!("{}", err).contains("tenant_name"));
    clear_env();
}

#[test]
fn duplicate_alias_across_connections_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        concat!(
            "LIMINAL_CONNECTION_A_TENANT_NAME=acme\n",
            "LIMINAL_CONNECTION_A_TENANT_ALIAS=shared\n",
            "LIMINAL_CONNECTION_B_TENANT_NAME=other\n",
            "LIMINAL_CONNECTION_B_TENANT_ALIAS=shared\n",
        ),
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("duplicate alias should fail");
    assert!(matches!(err, ConfigError::Registry(_)));
    clear_env();
}

#[test]
fn invalid_log_format_returns_error() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("LIMINAL_LOG_FORMAT", "xml");
    }
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("invalid log format should fail");
    assert!(format!("{}", err).contains("invalid log format"));

    clear_env();
}

#[test]
fn malformed_env_file_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "LIMINAL_LOG_LEVEL='unterminated\n");

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("malformed env file should fail");
    assert!(matches!(err, ConfigError::EnvFile { .. }));
    clear_env();
}

#[cfg(unix)]
#[test]
fn non_unicode_unrelated_variable_is_skipped() {
    use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("UNRELATED_BINARY", OsStr::from_bytes(&[0xff, 0xfe]));
        env::set_var("LIMINAL_CONNECTION_PROD_TENANT_NAME", "acme");
    }

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let result = loader.load();

    unsafe {
        env::remove_var("UNRELATED_BINARY");
    }
    let cfg = result.expect("unrelated non-unicode variable is ignored");
    assert_eq!(cfg.connections.len(), 1);
    clear_env();
}

#[cfg(unix)]
#[test]
fn non_unicode_prefixed_value_returns_error() {
    use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("LIMINAL_LOG_LEVEL", OsStr::from_bytes(&[0xff, 0xfe]));
    }

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("non-unicode LIMINAL_ value should fail");
    assert!(matches!(err, ConfigError::NonUnicodeEnv { ref key } if key == "LIMINAL_LOG_LEVEL"));
    clear_env();
}

#[test]
fn later_layers_override_single_connection_fields() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "LIMINAL_CONNECTION_PROD_TENANT_NAME=acme\nLIMINAL_CONNECTION_PROD_REGISTRY_ID=src_1\n",
    );
    write_env_file(
        &temp_dir,
        ".env.local",
        "LIMINAL_CONNECTION_PROD_REGISTRY_ID=src_2\n",
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads connection overrides");
    let prod = cfg.connections.get("acme").unwrap();
    assert_eq!(prod.registry_id(), Some("src_2"));
    clear_env();
}
