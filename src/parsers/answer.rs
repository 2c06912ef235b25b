//! Extraction of the suggestion from tagged model output.
//!
//! Models are prompted to wrap the continuation in `<answer>…</answer>` and
//! may emit reasoning in `<think>…</think>`. Selection rules, in order:
//!
//! 1. `<answer>` present: the text after the first `<answer>` up to the next
//!    `</answer>`, or to the end when unterminated. Not trimmed.
//! 2. `</think>` present: everything after the first `</think>`, trimmed.
//! 3. Unterminated `<think>`: everything after it, trimmed.
//! 4. No tags: the raw text unchanged.
//!
//! The selection is then normalized until it stops changing: `<think>…</think>`
//! spans are removed, a dangling `<think>` drops the rest of the text, and
//! stray `</think>`, `<answer>`, `</answer>` tokens are removed. The output
//! therefore never contains a tag, which makes extraction idempotent.

const ANSWER_OPEN: &str = "<answer>";
const ANSWER_CLOSE: &str = "</answer>";
const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

pub fn extract_answer(raw: &str) -> String {
    normalize(select(raw))
}

fn select(raw: &str) -> &str {
    if let Some(start) = raw.find(ANSWER_OPEN) {
        let rest = &raw[start + ANSWER_OPEN.len()..];
        return match rest.find(ANSWER_CLOSE) {
            Some(end) => &rest[..end],
            None => rest,
        };
    }
    if let Some(close) = raw.find(THINK_CLOSE) {
        return raw[close + THINK_CLOSE.len()..].trim();
    }
    if let Some(open) = raw.find(THINK_OPEN) {
        return raw[open + THINK_OPEN.len()..].trim();
    }
    raw
}

fn normalize(selected: &str) -> String {
    let mut current = selected.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + THINK_OPEN.len()..];
        match after_open.find(THINK_CLOSE) {
            Some(close) => rest = &after_open[close + THINK_CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);

    out.replace(THINK_CLOSE, "")
        .replace(ANSWER_OPEN, "")
        .replace(ANSWER_CLOSE, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_tag_pair() {
        assert_eq!(extract_answer("foo<answer>bar</answer>baz"), "bar");
    }

    #[test]
    fn unterminated_answer_runs_to_end() {
        assert_eq!(extract_answer("<answer>bar"), "bar");
    }

    #[test]
    fn untagged_text_is_unchanged() {
        assert_eq!(extract_answer(" and thanks for asking."), " and thanks for asking.");
        assert_eq!(extract_answer(""), "");
    }

    #[test]
    fn think_block_then_answer_text() {
        assert_eq!(extract_answer("<think>x</think>y"), "y");
        assert_eq!(extract_answer("<think>\nplan\n</think>\n\n  the rest "), "the rest");
    }

    #[test]
    fn unterminated_think_keeps_tail() {
        assert_eq!(extract_answer("<think>  partial thought"), "partial thought");
    }

    #[test]
    fn answer_whitespace_is_preserved() {
        assert_eq!(extract_answer("<answer> you can</answer>"), " you can");
    }

    #[test]
    fn think_inside_answer_is_stripped() {
        assert_eq!(extract_answer("<answer><think>hmm</think>bar</answer>"), "bar");
        assert_eq!(extract_answer("<answer>a<think>b</think>c</answer>"), "ac");
    }

    #[test]
    fn answer_wins_over_preceding_think() {
        assert_eq!(
            extract_answer("<think>draft <answer>no</answer></think><answer>yes</answer>"),
            "no"
        );
        assert_eq!(extract_answer("<think>reasoning</think><answer>final</answer>"), "final");
    }

    #[test]
    fn repeated_answer_tags_take_first() {
        assert_eq!(extract_answer("<answer>one</answer><answer>two</answer>"), "one");
    }

    #[test]
    fn nested_answer_open_is_removed() {
        assert_eq!(extract_answer("<answer>a<answer>b</answer>c"), "ab");
    }

    #[test]
    fn bare_think_close_acts_as_block_end() {
        assert_eq!(extract_answer("reasoning only</think> reply"), "reply");
    }

    #[test]
    fn multiple_think_blocks() {
        assert_eq!(extract_answer("<think>a</think>b<think>c</think>d"), "bd");
    }

    #[test]
    fn dangling_think_after_text_is_dropped() {
        assert_eq!(extract_answer("<answer>keep<think>drop"), "keep");
    }

    #[test]
    fn removal_cannot_forge_a_new_tag() {
        let out = extract_answer("<answer><thi<think>x</think>nk>tail</answer>");
        assert!(!out.contains("<think>"));
        assert_eq!(out, "");
    }

    #[test]
    fn extraction_is_idempotent() {
        let inputs = [
            "foo<answer>bar</answer>baz",
            "<answer>bar",
            "plain text",
            "<think>x</think>y",
            "<think>  partial",
            "<think>a<think>b",
            "<answer>x</think>y</answer>",
            "<answer>a<answer>b</answer>c",
            "<think>a</think>b<think>c</think>d",
            " leading and trailing ",
            "<answer><thi<think>x</think>nk>tail</answer>",
            "a</think>b<think>c",
            "<answer>  </answer>",
            "åäö<answer>ünïcödé</answer>",
        ];
        for input in inputs {
            let once = extract_answer(input);
            let twice = extract_answer(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }
}
