use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// Output of the three-stage split: stage-1 text is a single document
/// (tables-without-keys plus views/routines/procedures), stage-2/3 are
/// per-table fragments keyed by table name, written out only when
/// non-empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub stage1: String,
    pub stage2: BTreeMap<String, String>,
    pub stage3: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct TableBuffers {
    table: String,
    columns: Vec<String>,
    stage2_fragments: Vec<String>,
    stage3_fragments: Vec<String>,
    has_auto_increment: bool,
}

impl TableBuffers {
    fn new(table: &str) -> Self {
        TableBuffers {
            table: table.to_string(),
            ..Default::default()
        }
    }

    fn flush_into(self, out: &mut StageOutput, stage1_buf: &mut String) {
        if !self.columns.is_empty() {
            stage1_buf.push_str(&self.columns.join(",\n"));
        }

        if !self.stage2_fragments.is_empty() {
            out.stage2.insert(
                self.table.clone(),
                format!(
                    "ALTER TABLE `{}`\n  {};\n",
                    self.table,
                    self.stage2_fragments.join(",\n  ")
                ),
            );
        }

        if !self.stage3_fragments.is_empty() {
            out.stage3.insert(
                self.table.clone(),
                format!(
                    "ALTER TABLE `{}`\n  {};\n",
                    self.table,
                    self.stage3_fragments.join(",\n  ")
                ),
            );
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum State {
    Database,
    TablePreamble,
    Columns,
}

fn table_comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^-- Table structure for table [`']([^`']+)[`']").unwrap()
    })
}

fn create_table_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^CREATE TABLE `([^`]+)` \($").unwrap())
}

fn table_close_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\)\s*ENGINE=").unwrap())
}

fn column_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*`([^`]+)`\s+(.*)$").unwrap())
}

fn strip_trailing_comma(line: &str) -> &str {
    line.trim_end().strip_suffix(',').unwrap_or(line.trim_end())
}

/// Splits a full schema dump into stage-1 (columns/views/routines),
/// stage-2 (per-table keys/AUTO_INCREMENT) and stage-3 (per-table foreign
/// keys) via a line-oriented state machine.
pub fn split_stages(ddl: &str) -> StageOutput {
    let mut out = StageOutput::default();
    let mut stage1 = String::new();
    let mut state = State::Database;
    let mut current: Option<TableBuffers> = None;

    for line in ddl.lines() {
        match state {
            State::Database => {
                if let Some(caps) = table_comment_regex().captures(line) {
                    current = Some(TableBuffers::new(&caps[1]));
                    state = State::TablePreamble;
                }
                stage1.push_str(line);
                stage1.push('\n');
            }
            State::TablePreamble => {
                if let Some(caps) = create_table_regex().captures(line) {
                    let table = caps[1].to_string();
                    if current.as_ref().map(|t| t.table.as_str()) != Some(table.as_str()) {
                        current = Some(TableBuffers::new(&table));
                    }
                    stage1.push_str(line);
                    stage1.push('\n');
                    state = State::Columns;
                } else {
                    stage1.push_str(line);
                    stage1.push('\n');
                }
            }
            State::Columns => {
                let trimmed = line.trim();

                if table_close_regex().is_match(trimmed) {
                    if let Some(buf) = current.take() {
                        buf.flush_into(&mut out, &mut stage1);
                    }
                    stage1.push('\n');
                    stage1.push_str(line);
                    stage1.push('\n');
                    state = State::Database;
                    continue;
                }

                let buf = current.get_or_insert_with(|| TableBuffers::new(""));
                let body = strip_trailing_comma(trimmed);

                if body.starts_with("CONSTRAINT") {
                    buf.stage3_fragments.push(format!("ADD {body}"));
                } else if body.starts_with("PRIMARY KEY") {
                    if !buf.has_auto_increment {
                        buf.stage2_fragments.push(format!("ADD {body}"));
                    }
                    // else: skipped, implied by the AUTO_INCREMENT MODIFY below.
                } else if body.starts_with("KEY") || body.starts_with("UNIQUE KEY") {
                    buf.stage2_fragments.push(format!("ADD {body}"));
                } else if body.contains("AUTO_INCREMENT") {
                    buf.has_auto_increment = true;
                    let without_ai = body
                        .replace(" AUTO_INCREMENT", "")
                        .replace("AUTO_INCREMENT ", "")
                        .replace("AUTO_INCREMENT", "");
                    if let Some(caps) = column_name_regex().captures(body) {
                        let col = &caps[1];
                        let def_without_ai = column_name_regex()
                            .captures(without_ai.as_str())
                            .map(|c| c[2].to_string())
                            .unwrap_or_default();
                        buf.stage2_fragments.push(format!(
                            "MODIFY `{col}` {def_without_ai} AUTO_INCREMENT PRIMARY KEY"
                        ));
                    }
                    buf.columns.push(without_ai);
                } else {
                    buf.columns.push(body.to_string());
                }
            }
        }
    }

    out.stage1 = stage1;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"-- Table structure for table `users`
DROP TABLE IF EXISTS `users`;
CREATE TABLE `users` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `name` varchar(255) NOT NULL,
  PRIMARY KEY (`id`),
  KEY `idx_name` (`name`)
) ENGINE=InnoDB;
-- Table structure for table `orders`
DROP TABLE IF EXISTS `orders`;
CREATE TABLE `orders` (
  `id` int(11) NOT NULL,
  `user_id` int(11) NOT NULL,
  PRIMARY KEY (`id`),
  CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)
) ENGINE=InnoDB;
"#;

    #[test]
    fn stage1_has_no_auto_increment_modifier() {
        let out = split_stages(SAMPLE);
        assert!(!out.stage1.contains("AUTO_INCREMENT"));
    }

    #[test]
    fn auto_increment_column_yields_single_stage2_modify() {
        let out = split_stages(SAMPLE);
        let users_stage2 = out.stage2.get("users").unwrap();
        assert!(users_stage2.contains("MODIFY `id`"));
        assert!(users_stage2.contains("AUTO_INCREMENT PRIMARY KEY"));
        // PRIMARY KEY (...) is skipped because has_auto_increment is true.
        assert_eq!(users_stage2.matches("PRIMARY KEY").count(), 1);
        assert!(users_stage2.contains("ADD KEY `idx_name`"));
    }

    #[test]
    fn non_auto_increment_primary_key_becomes_stage2_add() {
        let out = split_stages(SAMPLE);
        let orders_stage2 = out.stage2.get("orders").unwrap();
        assert!(orders_stage2.contains("ADD PRIMARY KEY (`id`)"));
    }

    #[test]
    fn foreign_keys_land_in_stage3_only() {
        let out = split_stages(SAMPLE);
        assert!(!out.stage2.get("orders").unwrap().contains("CONSTRAINT"));
        let stage3 = out.stage3.get("orders").unwrap();
        assert!(stage3.starts_with("ALTER TABLE `orders`"));
        assert!(stage3.contains("ADD CONSTRAINT `fk_user`"));
    }

    #[test]
    fn table_without_keys_produces_no_stage_files() {
        let ddl = "-- Table structure for table `logs`\nCREATE TABLE `logs` (\n  `id` int(11) NOT NULL,\n  `msg` text\n) ENGINE=InnoDB;\n";
        let out = split_stages(ddl);
        assert!(out.stage2.get("logs").is_none());
        assert!(out.stage3.get("logs").is_none());
    }
}
