#[cfg(test)]
mod tests {
    use crate::cli::validation::parse_local_upstream;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_parse_local_upstream_accepts_origins() {
        let url = parse_local_upstream("localhost:3000").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(3000));

        let url = parse_local_upstream("https://api.example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.port(), None);

        assert!(parse_local_upstream("http://127.0.0.1:8080/").is_ok());
    }

    #[test]
    fn test_parse_local_upstream_rejects_bad_values() {
        assert!(parse_local_upstream("").is_err());
        assert!(parse_local_upstream("   ").is_err());
        assert!(parse_local_upstream("ftp://example.com").is_err());
        assert!(parse_local_upstream("localhost:3000/api").is_err());
        assert!(parse_local_upstream("localhost:3000?x=1").is_err());
        assert!(parse_local_upstream("http://").is_err());
        assert!(parse_local_upstream("localhost:99999").is_err());
    }

    #[test]
    fn test_dev_command_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "edgelab",
            "dev",
            "src/index.js",
            "--port",
            "9000",
            "--minify",
            "--local-upstream",
            "localhost:3000",
            "--refresh-command",
            "npm run codegen",
            "--debug",
        ])
        .unwrap();

        assert!(cli.debug);
        let Command::Dev(args) = cli.command else {
            panic!("expected dev command");
        };
        assert_eq!(args.entry, Some(PathBuf::from("src/index.js")));
        assert_eq!(args.port, Some(9000));
        assert!(args.minify);
        assert_eq!(args.local_upstream.as_deref(), Some("localhost:3000"));
        assert_eq!(args.refresh_command.as_deref(), Some("npm run codegen"));
    }

    #[test]
    fn test_dev_command_defaults() {
        let cli = Cli::try_parse_from(["edgelab", "dev"]).unwrap();
        let Command::Dev(args) = cli.command else {
            panic!("expected dev command");
        };
        assert!(args.entry.is_none());
        assert!(args.port.is_none());
        assert!(!args.minify);
    }

    #[test]
    fn test_sessions_command() {
        let cli = Cli::try_parse_from(["edgelab", "sessions", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Sessions(ref a) if a.json));
    }

    #[test]
    fn test_debug_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["edgelab", "--debug", "--quiet", "dev"]).is_err());
    }
}
