//! Prometheus text exposition format (version 0.0.4).
//!
//! ```text
//! # HELP mariadb_stats_total_connections The number of connections created for this user.
//! # TYPE mariadb_stats_total_connections counter
//! mariadb_stats_total_connections{user="alice",node="db1"} 5
//! ```
//!
//! Unlike OpenMetrics, counters keep their plain name (no `_total` suffix) and
//! the output carries no `# EOF` marker.

use std::fmt::Write;

use super::encode_value;
use crate::catalog::MetricDefinition;
use crate::collector::Sample;
use crate::registry::MetricFamily;

/// Encode the given [`MetricFamily`]s in the Prometheus text format.
///
/// Every family is described with a `# HELP` and `# TYPE` line, even when the
/// scrape produced no samples for it.
pub fn encode<W: Write>(
    writer: &mut W,
    families: &[MetricFamily<'_>],
) -> Result<(), std::fmt::Error> {
    for family in families {
        encode_descriptor(writer, family.definition)?;
        for sample in &family.samples {
            encode_sample(writer, sample)?;
        }
    }

    Ok(())
}

fn encode_descriptor<W: Write>(
    writer: &mut W,
    definition: &MetricDefinition,
) -> Result<(), std::fmt::Error> {
    writer.write_str("# HELP ")?;
    writer.write_str(definition.name())?;
    writer.write_str(" ")?;
    write_escaped(writer, definition.help(), false)?;
    writer.write_str("\n")?;

    writer.write_str("# TYPE ")?;
    writer.write_str(definition.name())?;
    writer.write_str(" ")?;
    writer.write_str(definition.kind().as_str())?;
    writer.write_str("\n")?;

    Ok(())
}

fn encode_sample<W: Write>(writer: &mut W, sample: &Sample<'_>) -> Result<(), std::fmt::Error> {
    writer.write_str(sample.definition.name())?;

    let mut labels = sample.labels().peekable();
    if labels.peek().is_some() {
        writer.write_char('{')?;
        let mut first = true;
        for (name, value) in labels {
            if !first {
                writer.write_char(',')?;
            }
            first = false;

            writer.write_str(name)?;
            writer.write_str("=\"")?;
            write_escaped(writer, value, true)?;
            writer.write_char('"')?;
        }
        writer.write_char('}')?;
    }

    writer.write_char(' ')?;
    encode_value(writer, sample.value)?;
    writer.write_char('\n')
}

// Help text escapes `\` and newline; label values additionally escape `"`.
fn write_escaped<W: Write>(writer: &mut W, s: &str, quote: bool) -> Result<(), std::fmt::Error> {
    let mut rest = s;
    while let Some(i) = rest.find(|c: char| c == '\\' || c == '\n' || (quote && c == '"')) {
        writer.write_str(&rest[..i])?;
        match rest.as_bytes()[i] {
            b'\\' => writer.write_str("\\\\")?,
            b'\n' => writer.write_str("\\n")?,
            _ => writer.write_str("\\\"")?,
        }
        rest = &rest[i + 1..];
    }
    writer.write_str(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_catalog;
    use quickcheck::QuickCheck;

    fn encode_to_string(families: &[MetricFamily<'_>]) -> String {
        let mut buffer = String::new();
        encode(&mut buffer, families).unwrap();
        buffer
    }

    #[test]
    fn encode_per_user_counter() {
        let catalog = build_catalog();
        let definition = catalog
            .iter()
            .find(|d| d.name() == "mariadb_stats_total_connections")
            .unwrap();
        let families = vec![MetricFamily {
            definition,
            samples: vec![Sample {
                definition,
                label_values: vec!["alice".to_string(), "db1".to_string()],
                value: 5.0,
            }],
        }];

        let expected = "# HELP mariadb_stats_total_connections The number of connections created for this user.\n".to_owned()
            + "# TYPE mariadb_stats_total_connections counter\n"
            + "mariadb_stats_total_connections{user=\"alice\",node=\"db1\"} 5\n";
        assert_eq!(expected, encode_to_string(&families));
    }

    #[test]
    fn encode_instance_counter() {
        let catalog = build_catalog();
        let definition = &catalog[0];
        let families = vec![MetricFamily {
            definition,
            samples: vec![Sample {
                definition,
                label_values: vec!["db1".to_string()],
                value: 1048576.0,
            }],
        }];

        let expected = "# HELP mariadb_stats_memory_used Total Memory used by MariaDB.\n".to_owned()
            + "# TYPE mariadb_stats_memory_used counter\n"
            + "mariadb_stats_memory_used{node=\"db1\"} 1048576\n";
        assert_eq!(expected, encode_to_string(&families));
    }

    #[test]
    fn family_without_samples_is_still_described() {
        let catalog = build_catalog();
        let families: Vec<_> = catalog
            .iter()
            .map(|definition| MetricFamily {
                definition,
                samples: vec![],
            })
            .collect();

        let encoded = encode_to_string(&families);

        assert_eq!(2 * catalog.len(), encoded.lines().count());
        assert!(encoded.lines().all(|l| l.starts_with("# ")));
    }

    #[test]
    fn encode_without_labels() {
        let definition = MetricDefinition::instance("up", "Up");
        let mut sample = Sample {
            definition: &definition,
            label_values: vec![],
            value: 1.0,
        };
        let mut buffer = String::new();
        encode_sample(&mut buffer, &sample).unwrap();
        assert_eq!("up 1\n", buffer);

        sample.value = 0.5;
        buffer.clear();
        encode_sample(&mut buffer, &sample).unwrap();
        assert_eq!("up 0.5\n", buffer);
    }

    #[test]
    fn escapes_label_values_and_help() {
        let definition = MetricDefinition::instance("m", "line\\one\nline \"two\"");
        let families = vec![MetricFamily {
            definition: &definition,
            samples: vec![Sample {
                definition: &definition,
                label_values: vec!["a\"b\\c\nd".to_string()],
                value: 2.0,
            }],
        }];

        let expected = "# HELP m line\\\\one\\nline \"two\"\n".to_owned()
            + "# TYPE m counter\n"
            + "m{node=\"a\\\"b\\\\c\\nd\"} 2\n";
        assert_eq!(expected, encode_to_string(&families));
    }

    fn unescape(s: &str) -> String {
        let mut out = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some(other) => out.push(other),
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn escaped_label_values_round_trip() {
        fn prop(value: String) -> bool {
            let mut escaped = String::new();
            write_escaped(&mut escaped, &value, true).unwrap();

            let unquoted_quote = escaped
                .char_indices()
                .any(|(i, c)| c == '"' && !escaped[..i].ends_with('\\'));
            !escaped.contains('\n') && !unquoted_quote && unescape(&escaped) == value
        }

        QuickCheck::new().quickcheck(prop as fn(String) -> bool);
    }
}
