use once_cell::sync::Lazy;
use regex::Regex;

static BLOCK_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").unwrap());

/// Lines containing any of these (case-insensitive, substring match) are
/// dropped wholesale. The model occasionally echoes code fragments or
/// tracebacks instead of prose; a matching line is junk far more often
/// than it is part of an answer.
const SUSPICIOUS_KEYWORDS: &[&str] = &["import", "requests", "sys", "error", "usage"];

/// Cleans up generated text before it is shown to a client or sent to a
/// search engine: strips block comments, drops comment-like and
/// suspicious-keyword lines, collapses blank runs. Idempotent.
pub fn sanitize(text: &str) -> String {
    let text = text.trim();
    let text = BLOCK_COMMENT_RE.replace_all(text, "");

    let kept = text
        .split('\n')
        .filter(|line| !line.contains("//") && !line.contains("TODO"))
        .filter(|line| {
            let lower = line.to_lowercase();
            !SUSPICIOUS_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUN_RE.replace_all(&kept, "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(sanitize("  кампус ИТМО  \n"), "кампус ИТМО");
    }

    #[test]
    fn removes_block_comments() {
        assert_eq!(sanitize("до /* мусор */ после"), "до  после");
        assert_eq!(
            sanitize("строка /* многострочный\nкомментарий */ хвост"),
            "строка  хвост"
        );
    }

    #[test]
    fn drops_line_comment_and_todo_lines() {
        let input = "первая строка\n// комментарий\nвторая строка\nTODO починить\nтретья";
        assert_eq!(sanitize(input), "первая строка\nвторая строка\nтретья");
    }

    #[test]
    fn drops_suspicious_keyword_lines_case_insensitively() {
        let input = "ответ модели\nImport antigravity\nпродолжение";
        assert_eq!(sanitize(input), "ответ модели\nпродолжение");
    }

    #[test]
    fn denylist_matches_inside_legitimate_prose() {
        // Substring match is intentionally aggressive: a sentence merely
        // mentioning an error is dropped along with actual tracebacks.
        let input = "no error occurred\nвсё хорошо";
        assert_eq!(sanitize(input), "всё хорошо");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(sanitize("a\n\n\n\nb\n \n \nc"), "a\nb\nc");
    }

    #[test]
    fn url_lines_are_dropped_by_the_line_comment_rule() {
        // "//" inside https:// counts as a line comment marker.
        let input = "подробнее на https://itmo.ru\nостальной текст";
        assert_eq!(sanitize(input), "остальной текст");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   \n\t  "), "");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "обычный текст",
            "  a /* x */ b\n\nc // d\nTODO\nerror here\nконец  ",
            "a\n \n \nb",
            "/* только комментарий */",
            "незакрытый /* комментарий",
            "хвост */ без начала",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not idempotent for {sample:?}");
        }
    }
}
