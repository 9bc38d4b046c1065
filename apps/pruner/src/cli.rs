//! Command-line surface.

use clap::Parser;
use queue_filter::{AmqpConfig, FilterConfig, MatchMode};

#[derive(Parser, Debug)]
#[command(name = "queue-pruner")]
#[command(about = "Filter RabbitMQ queue messages by content")]
pub struct Cli {
    /// Broker host.
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Broker port.
    #[arg(long, default_value_t = 5672)]
    pub port: u16,

    /// Virtual host.
    #[arg(long, default_value = "/")]
    pub vhost: String,

    /// Broker user.
    #[arg(long, default_value = "guest")]
    pub user: String,

    /// Broker password.
    #[arg(long, default_value = "guest")]
    pub password: String,

    /// Source queue; also the republish destination.
    #[arg(long)]
    pub queue: String,

    /// Substring rule; repeat the flag for multiple rules.
    #[arg(long = "match")]
    pub match_rules: Vec<String>,

    /// How rules combine: "any" (default) drops a message containing any
    /// rule, "all" only one containing every rule.
    #[arg(long, default_value = "any")]
    pub match_mode: MatchMode,

    /// Match case-insensitively.
    #[arg(long)]
    pub ignore_case: bool,

    /// Republish non-matching messages instead of dropping them too.
    #[arg(long)]
    pub republish: bool,

    /// Concurrent consumer count.
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Acknowledgment batch threshold.
    #[arg(long, default_value_t = 50)]
    pub batch_size: usize,

    /// Stop after this many messages; 0 or absent means unbounded.
    #[arg(long)]
    pub max_messages: Option<u64>,
}

impl Cli {
    pub fn amqp_config(&self) -> AmqpConfig {
        AmqpConfig {
            host: self.host.clone(),
            port: self.port,
            vhost: self.vhost.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }

    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig::new(self.queue.clone())
            .with_patterns(self.match_rules.clone())
            .with_mode(self.match_mode)
            .with_ignore_case(self.ignore_case)
            .with_republish(self.republish)
            .with_workers(self.workers)
            .with_batch_size(self.batch_size)
            .with_max_messages(self.max_messages.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["queue-pruner", "--queue", "events"]).unwrap();
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 5672);
        assert_eq!(cli.vhost, "/");
        assert_eq!(cli.user, "guest");
        assert_eq!(cli.password, "guest");
        assert_eq!(cli.queue, "events");
        assert!(cli.match_rules.is_empty());
        assert_eq!(cli.match_mode, MatchMode::Any);
        assert!(!cli.ignore_case);
        assert!(!cli.republish);
        assert_eq!(cli.workers, 1);
        assert_eq!(cli.batch_size, 50);
        assert_eq!(cli.max_messages, None);
    }

    #[test]
    fn test_queue_is_required() {
        assert!(Cli::try_parse_from(["queue-pruner"]).is_err());
    }

    #[test]
    fn test_match_is_repeatable() {
        let cli = Cli::try_parse_from([
            "queue-pruner",
            "--queue",
            "events",
            "--match",
            "foo",
            "--match",
            "bar",
            "--match-mode",
            "all",
        ])
        .unwrap();
        assert_eq!(cli.match_rules, vec!["foo", "bar"]);
        assert_eq!(cli.match_mode, MatchMode::All);
    }

    #[test]
    fn test_invalid_match_mode_is_rejected() {
        let result = Cli::try_parse_from([
            "queue-pruner",
            "--queue",
            "events",
            "--match-mode",
            "most",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_max_messages_means_unbounded() {
        let cli = Cli::try_parse_from([
            "queue-pruner",
            "--queue",
            "events",
            "--max-messages",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.filter_config().max_messages, None);
    }

    #[test]
    fn test_filter_config_conversion() {
        let cli = Cli::try_parse_from([
            "queue-pruner",
            "--queue",
            "events",
            "--match",
            "error",
            "--ignore-case",
            "--republish",
            "--workers",
            "4",
            "--batch-size",
            "20",
            "--max-messages",
            "100",
        ])
        .unwrap();

        let config = cli.filter_config();
        assert_eq!(config.queue, "events");
        assert_eq!(config.patterns, vec!["error"]);
        assert!(config.ignore_case);
        assert!(config.republish);
        assert_eq!(config.workers, 4);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_messages, Some(100));
    }

    #[test]
    fn test_amqp_config_conversion() {
        let cli = Cli::try_parse_from([
            "queue-pruner",
            "--queue",
            "events",
            "--host",
            "mq.internal",
            "--port",
            "5671",
            "--vhost",
            "prod",
            "--user",
            "pruner",
            "--password",
            "secret",
        ])
        .unwrap();

        let amqp = cli.amqp_config();
        assert_eq!(amqp.host, "mq.internal");
        assert_eq!(amqp.port, 5671);
        assert_eq!(amqp.vhost, "prod");
        assert_eq!(amqp.user, "pruner");
        assert_eq!(amqp.password, "secret");
    }
}
