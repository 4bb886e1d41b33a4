//! End-to-end tests of the `phoenix-handler` binary

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use std::fs;
    use tempfile::TempDir;

    /// Writes a config pointing at a database file inside `dir`.
    fn write_config(dir: &TempDir, url: &str) -> String {
        let path = dir.path().join("connection.toml");
        let content = format!(
            "name = \"cli_test\"\n\n[connection]\nurl = \"{}\"\nautocommit = true\n",
            url
        );
        fs::write(&path, content).unwrap();
        path.display().to_string()
    }

    fn sqlite_config(dir: &TempDir) -> String {
        let db = dir.path().join("cli.db");
        write_config(dir, &format!("sqlite://{}", db.display()))
    }

    fn run(config: &str, args: &[&str]) -> assert_cmd::assert::Assert {
        Command::cargo_bin("phoenix-handler")
            .unwrap()
            .arg("--config")
            .arg(config)
            .args(args)
            .assert()
    }

    #[test]
    fn test_native_then_tables_and_columns() {
        let dir = TempDir::new().unwrap();
        let config = sqlite_config(&dir);

        let out = run(&config, &["native", "CREATE TABLE web_stat (host VARCHAR, hits INTEGER)"]).success();
        let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
        assert!(stdout.contains("\"ack\""));

        let out = run(&config, &["tables"]).success();
        let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(json["type"], "table");
        assert_eq!(json["columns"], serde_json::json!(["table_name"]));
        assert_eq!(json["rows"], serde_json::json!([["web_stat"]]));

        let out = run(&config, &["columns", "web_stat"]).success();
        let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(
            json["rows"],
            serde_json::json!([["host", "VARCHAR"], ["hits", "INTEGER"]])
        );
    }

    #[test]
    fn test_query_error_exits_nonzero() {
        let dir = TempDir::new().unwrap();
        let config = sqlite_config(&dir);

        let out = run(&config, &["query", "SELECT * FROM nowhere"]).failure();
        let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
        assert!(stdout.contains("\"error\""));
        assert!(stdout.contains("no such table"));
    }

    #[test]
    fn test_check_unreachable_server() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "http://127.0.0.1:8765");

        let out = run(&config, &["check"]).failure();
        let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(json["success"], false);
    }

    #[test]
    fn test_usage_error() {
        Command::cargo_bin("phoenix-handler")
            .unwrap()
            .arg("bogus")
            .assert()
            .code(2);
    }
}
