use regex::Regex;
use std::sync::OnceLock;

/// Collapses a `DEFINER=user@host` directive (with its optional
/// version-gated comment wrapper and optional `SQL SECURITY DEFINER`
/// clause) to a single space. Matches backticked or bare identifiers and
/// `%` wildcards.
fn definer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(\*/)?\s*(/\*!\d+)?\s*DEFINER\s*=\s*(`[^`]*`|[^\s@]+)@(`[^`]*`|[A-Za-z0-9_.%]+)\s*(\*/)?\s*(SQL SECURITY DEFINER)?",
        )
        .expect("static DEFINER regex is valid")
    })
}

pub fn strip_definer(line: &str) -> String {
    definer_regex().replace_all(line, " ").into_owned()
}

/// Legacy behavior retained from the original tool: lines starting with
/// `ALTER DATABASE` are dropped outright.
pub fn strip_alter_database_lines(ddl: &str) -> String {
    ddl.lines()
        .filter(|line| !line.trim_start().starts_with("ALTER DATABASE"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn word_boundary_regex(word: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(word))).expect("escaped literal is a valid regex")
}

/// Replaces every whole-word occurrence of `database` with `#DATABASE#`.
pub fn tokenise(ddl: &str, database: &str) -> String {
    word_boundary_regex(database)
        .replace_all(ddl, "#DATABASE#")
        .into_owned()
}

/// Reverses [`tokenise`], substituting `target` for every `#DATABASE#`
/// placeholder.
pub fn detokenise(ddl: &str, target: &str) -> String {
    ddl.replace("#DATABASE#", target)
}

/// Runs the full per-line rewrite (DEFINER strip, `ALTER DATABASE` drop)
/// used while producing `schema.ddl.tokenised` from `schema.ddl.orig`.
pub fn rewrite_schema(orig: &str, database: &str) -> String {
    let stripped: String = orig
        .lines()
        .map(strip_definer)
        .collect::<Vec<_>>()
        .join("\n");
    let without_alter_database = strip_alter_database_lines(&stripped);
    tokenise(&without_alter_database, database)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_versioned_definer_with_security_clause() {
        let line = "/*!50017 DEFINER=`dev`@`%` SQL SECURITY DEFINER */ PROCEDURE foo()";
        assert_eq!(strip_definer(line).trim(), "PROCEDURE foo()");
    }

    #[test]
    fn strips_bare_definer() {
        let line = "CREATE DEFINER=root@localhost PROCEDURE bar()";
        assert_eq!(strip_definer(line).trim(), "CREATE PROCEDURE bar()");
    }

    #[test]
    fn tokenise_replaces_whole_word_occurrences_only() {
        let ddl = "CREATE DATABASE `acme`;\nUSE `acme`;\n-- acmesub is unrelated";
        let tokenised = tokenise(ddl, "acme");
        assert!(tokenised.contains("#DATABASE#"));
        assert!(tokenised.contains("acmesub"));
        assert!(!tokenised.contains("`acme`"));
    }

    #[test]
    fn tokenise_then_detokenise_round_trips() {
        let ddl = "CREATE DATABASE `acme`;\nUSE `acme`;";
        let tokenised = tokenise(ddl, "acme");
        let restored = detokenise(&tokenised, "acme");
        assert_eq!(restored, ddl);
    }

    #[test]
    fn detokenise_with_new_name_yields_target_database() {
        let ddl = "CREATE DATABASE `acme`;";
        let tokenised = tokenise(ddl, "acme");
        let staged = detokenise(&tokenised, "acme_stage");
        assert_eq!(staged, "CREATE DATABASE `acme_stage`;");
    }

    #[test]
    fn drops_alter_database_lines() {
        let ddl = "ALTER DATABASE `acme` CHARACTER SET utf8;\nCREATE TABLE t (id INT);";
        let cleaned = strip_alter_database_lines(ddl);
        assert_eq!(cleaned, "CREATE TABLE t (id INT);");
    }
}
