//! Backing-store commands
//!
//! The subset of the Redis command set the engine issues. Keys are text;
//! values and members are raw bytes since string index members carry a NUL
//! separator.

use crate::scripts::Script;

/// One backing-store command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `HSET key field value [field value ...]`
    HSet {
        /// Hash key
        key: String,
        /// Field/value pairs
        fields: Vec<(String, Vec<u8>)>,
    },
    /// `HDEL key field [field ...]`
    HDel {
        /// Hash key
        key: String,
        /// Fields to remove
        fields: Vec<String>,
    },
    /// `HGETALL key`
    HGetAll {
        /// Hash key
        key: String,
    },
    /// `HMGET key field [field ...]`
    HMGet {
        /// Hash key
        key: String,
        /// Fields to read
        fields: Vec<String>,
    },
    /// `DEL key [key ...]`
    Del {
        /// Keys to delete
        keys: Vec<String>,
    },
    /// `SADD key member [member ...]`
    SAdd {
        /// Set key
        key: String,
        /// Members to add
        members: Vec<Vec<u8>>,
    },
    /// `SREM key member [member ...]`
    SRem {
        /// Set key
        key: String,
        /// Members to remove
        members: Vec<Vec<u8>>,
    },
    /// `SISMEMBER key member`
    SIsMember {
        /// Set key
        key: String,
        /// Member to test
        member: Vec<u8>,
    },
    /// `SCARD key`
    SCard {
        /// Set key
        key: String,
    },
    /// `SMEMBERS key`
    SMembers {
        /// Set key
        key: String,
    },
    /// `ZADD key score member [score member ...]`
    ZAdd {
        /// Sorted set key
        key: String,
        /// Score/member pairs
        entries: Vec<(f64, Vec<u8>)>,
    },
    /// `ZREM key member [member ...]`
    ZRem {
        /// Sorted set key
        key: String,
        /// Members to remove
        members: Vec<Vec<u8>>,
    },
    /// `ZSCORE key member`
    ZScore {
        /// Sorted set key
        key: String,
        /// Member to look up
        member: Vec<u8>,
    },
    /// `ZCARD key`
    ZCard {
        /// Sorted set key
        key: String,
    },
    /// `ZRANGE key start stop`
    ZRange {
        /// Sorted set key
        key: String,
        /// First rank, negative counts from the end
        start: i64,
        /// Last rank, inclusive, negative counts from the end
        stop: i64,
    },
    /// `EVAL` of a catalogued script
    Eval {
        /// Script to run
        script: Script,
        /// `KEYS`
        keys: Vec<String>,
        /// `ARGV`
        args: Vec<Vec<u8>>,
    },
}

impl Command {
    /// Build an `EVAL` command
    pub fn eval(script: Script, keys: Vec<String>, args: Vec<Vec<u8>>) -> Self {
        Command::Eval { script, keys, args }
    }

    /// Redis command name
    pub fn name(&self) -> &'static str {
        match self {
            Command::HSet { .. } => "HSET",
            Command::HDel { .. } => "HDEL",
            Command::HGetAll { .. } => "HGETALL",
            Command::HMGet { .. } => "HMGET",
            Command::Del { .. } => "DEL",
            Command::SAdd { .. } => "SADD",
            Command::SRem { .. } => "SREM",
            Command::SIsMember { .. } => "SISMEMBER",
            Command::SCard { .. } => "SCARD",
            Command::SMembers { .. } => "SMEMBERS",
            Command::ZAdd { .. } => "ZADD",
            Command::ZRem { .. } => "ZREM",
            Command::ZScore { .. } => "ZSCORE",
            Command::ZCard { .. } => "ZCARD",
            Command::ZRange { .. } => "ZRANGE",
            Command::Eval { .. } => "EVAL",
        }
    }

    /// Whether the command has every argument Redis requires
    ///
    /// Variadic commands need at least one element.
    pub fn has_required_args(&self) -> bool {
        match self {
            Command::HSet { fields, .. } => !fields.is_empty(),
            Command::HDel { fields, .. } | Command::HMGet { fields, .. } => !fields.is_empty(),
            Command::Del { keys } => !keys.is_empty(),
            Command::SAdd { members, .. }
            | Command::SRem { members, .. }
            | Command::ZRem { members, .. } => !members.is_empty(),
            Command::ZAdd { entries, .. } => !entries.is_empty(),
            Command::Eval { script, keys, .. } => keys.len() == script.num_keys(),
            _ => true,
        }
    }

    /// Arguments after the command name, as sent on the wire
    ///
    /// For `Eval` this is `numkeys key... arg...`; the script body or digest
    /// is supplied by the backend.
    pub fn wire_args(&self) -> Vec<Vec<u8>> {
        fn key(k: &str) -> Vec<u8> {
            k.as_bytes().to_vec()
        }

        match self {
            Command::HSet { key: k, fields } => {
                let mut args = vec![key(k)];
                for (field, value) in fields {
                    args.push(key(field));
                    args.push(value.clone());
                }
                args
            }
            Command::HDel { key: k, fields } | Command::HMGet { key: k, fields } => {
                std::iter::once(key(k))
                    .chain(fields.iter().map(|f| key(f)))
                    .collect()
            }
            Command::HGetAll { key: k }
            | Command::SCard { key: k }
            | Command::SMembers { key: k }
            | Command::ZCard { key: k } => vec![key(k)],
            Command::Del { keys } => keys.iter().map(|k| key(k)).collect(),
            Command::SAdd { key: k, members }
            | Command::SRem { key: k, members }
            | Command::ZRem { key: k, members } => std::iter::once(key(k))
                .chain(members.iter().cloned())
                .collect(),
            Command::SIsMember { key: k, member } | Command::ZScore { key: k, member } => {
                vec![key(k), member.clone()]
            }
            Command::ZAdd { key: k, entries } => {
                let mut args = vec![key(k)];
                for (score, member) in entries {
                    args.push(format_score(*score).into_bytes());
                    args.push(member.clone());
                }
                args
            }
            Command::ZRange { key: k, start, stop } => {
                vec![key(k), start.to_string().into_bytes(), stop.to_string().into_bytes()]
            }
            Command::Eval { keys, args, .. } => std::iter::once(keys.len().to_string().into_bytes())
                .chain(keys.iter().map(|k| key(k)))
                .chain(args.iter().cloned())
                .collect(),
        }
    }
}

/// Format a sorted-set score the way Redis parses it
pub fn format_score(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hset_wire_args() {
        let cmd = Command::HSet {
            key: "people:1".to_string(),
            fields: vec![
                ("Name".to_string(), b"Ann".to_vec()),
                ("Age".to_string(), b"30".to_vec()),
            ],
        };
        assert_eq!(
            cmd.wire_args(),
            vec![
                b"people:1".to_vec(),
                b"Name".to_vec(),
                b"Ann".to_vec(),
                b"Age".to_vec(),
                b"30".to_vec(),
            ]
        );
        assert_eq!(cmd.name(), "HSET");
    }

    #[test]
    fn test_eval_wire_args_lead_with_numkeys() {
        let cmd = Command::eval(
            Script::ExtractScoreRange,
            vec!["people:Age".to_string(), "tmp".to_string()],
            vec![b"(1".to_vec(), b"+inf".to_vec()],
        );
        assert_eq!(cmd.wire_args()[0], b"2".to_vec());
        assert_eq!(cmd.wire_args().len(), 5);
        assert!(cmd.has_required_args());
    }

    #[test]
    fn test_empty_variadics_are_incomplete() {
        let hset = Command::HSet {
            key: "k".to_string(),
            fields: vec![],
        };
        let del = Command::Del { keys: vec![] };
        let eval = Command::eval(Script::ExtractLexRange, vec!["only-one".to_string()], vec![]);
        assert!(!hset.has_required_args());
        assert!(!del.has_required_args());
        assert!(!eval.has_required_args());
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(1.0), "1");
        assert_eq!(format_score(-2.5), "-2.5");
        assert_eq!(format_score(f64::INFINITY), "+inf");
        assert_eq!(format_score(f64::NEG_INFINITY), "-inf");
    }

    proptest::proptest! {
        #[test]
        fn prop_score_text_round_trips(score in -1e300f64..1e300f64) {
            let text = format_score(score);
            proptest::prop_assert_eq!(crate::reply::parse_score(&text), Some(score));
        }
    }
}
