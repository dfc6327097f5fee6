use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{AskResponse, Citation};

static CITATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[doc([0-9]{1,3})\]").expect("citation marker pattern"));

static ID_DOC_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[iddoc\|([^|]+)\|([^|]+)\]").expect("iddoc link pattern"));

/// An answer ready for display: renumbered citations plus rewritten markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnswer {
    pub citations: Vec<Citation>,
    pub markdown_format_text: String,
    pub generated_chart: Option<String>,
}

/// Stamp `part_index` on each citation, counting per `filepath` in list order.
pub fn enumerate_citations(mut citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen: HashMap<Option<String>, u32> = HashMap::new();
    for citation in citations.iter_mut() {
        let part = seen
            .get(&citation.filepath)
            .map(|last| last + 1)
            .unwrap_or(1);
        seen.insert(citation.filepath.clone(), part);
        citation.part_index = Some(part);
    }
    citations
}

/// Turn a raw answer into display markdown and the citations it actually uses.
///
/// Returns `None` when the backend did not send a string answer. Markers pointing past
/// the citation list are left in the text untouched.
pub fn parse_answer(answer: &AskResponse) -> Option<ParsedAnswer> {
    let mut text = answer.answer.clone()?;

    let markers: Vec<(String, String)> = CITATION_MARKER
        .captures_iter(&text)
        .map(|cap| (cap[0].to_string(), cap[1].to_string()))
        .collect();

    let mut filtered: Vec<Citation> = Vec::new();
    let mut reindex = 0u32;
    for (token, digits) in markers {
        if filtered.iter().any(|c| c.id == digits) {
            continue;
        }
        let source = digits
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| answer.citations.get(i));
        let Some(source) = source else {
            tracing::debug!(marker = %token, "citation marker has no matching citation");
            continue;
        };

        reindex += 1;
        text = text.replace(&token, &format!(" ^{}^ ", reindex));

        let mut citation = source.clone();
        citation.id = digits;
        citation.reindex_id = Some(reindex.to_string());
        filtered.push(citation);
    }

    let citations = enumerate_citations(filtered);

    let links: Vec<(String, String, String)> = ID_DOC_LINK
        .captures_iter(&text)
        .map(|cap| (cap[0].to_string(), cap[1].to_string(), cap[2].to_string()))
        .collect();
    for (token, id_doc, reference) in links {
        text = text.replace(&token, &format!("[{}]({})", reference, id_doc));
    }

    Some(ParsedAnswer {
        citations,
        markdown_format_text: text,
        generated_chart: answer.generated_chart.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(filepath: &str) -> Citation {
        Citation {
            filepath: Some(filepath.to_string()),
            content: format!("content of {}", filepath),
            ..Default::default()
        }
    }

    fn answer(text: &str, citations: Vec<Citation>) -> AskResponse {
        AskResponse {
            answer: Some(text.to_string()),
            citations,
            ..Default::default()
        }
    }

    #[test]
    fn repeated_markers_collapse_to_one_citation() {
        let input = answer(
            "A [doc1] and B [doc2] and A again [doc1]",
            vec![citation("a.pdf"), citation("b.pdf")],
        );
        let parsed = parse_answer(&input).unwrap();

        assert_eq!(parsed.citations.len(), 2);
        assert_eq!(parsed.citations[0].id, "1");
        assert_eq!(parsed.citations[0].reindex_id.as_deref(), Some("1"));
        assert_eq!(parsed.citations[1].id, "2");
        assert_eq!(parsed.citations[1].reindex_id.as_deref(), Some("2"));
        assert_eq!(
            parsed.markdown_format_text,
            "A  ^1^  and B  ^2^  and A again  ^1^ "
        );
    }

    #[test]
    fn reindex_follows_text_order_not_array_order() {
        let input = answer(
            "first [doc3] then [doc1]",
            vec![citation("a.pdf"), citation("b.pdf"), citation("c.pdf")],
        );
        let parsed = parse_answer(&input).unwrap();

        assert_eq!(parsed.citations[0].filepath.as_deref(), Some("c.pdf"));
        assert_eq!(parsed.citations[0].reindex_id.as_deref(), Some("1"));
        assert_eq!(parsed.citations[1].filepath.as_deref(), Some("a.pdf"));
        assert_eq!(parsed.markdown_format_text, "first  ^1^  then  ^2^ ");
    }

    #[test]
    fn out_of_range_markers_are_left_in_place() {
        let input = answer("see [doc5] and [doc0] and [doc1]", vec![citation("a.pdf")]);
        let parsed = parse_answer(&input).unwrap();

        assert_eq!(parsed.citations.len(), 1);
        assert_eq!(parsed.markdown_format_text, "see [doc5] and [doc0] and  ^1^ ");
    }

    #[test]
    fn four_digit_markers_are_not_citations() {
        let input = answer("big [doc1000]", vec![citation("a.pdf")]);
        let parsed = parse_answer(&input).unwrap();

        assert!(parsed.citations.is_empty());
        assert_eq!(parsed.markdown_format_text, "big [doc1000]");
    }

    #[test]
    fn only_ascii_digits_form_markers() {
        let input = answer("arabic [doc١] and fullwidth [doc１] then [doc1]", vec![citation("a.pdf")]);
        assert_eq!(CITATION_MARKER.find_iter(&input.answer.clone().unwrap()).count(), 1);

        let parsed = parse_answer(&input).unwrap();
        assert_eq!(parsed.citations.len(), 1);
        assert_eq!(
            parsed.markdown_format_text,
            "arabic [doc١] and fullwidth [doc１] then  ^1^ "
        );
    }

    #[test]
    fn part_index_counts_per_filepath() {
        let input = answer(
            "[doc1] [doc2] [doc3] [doc4]",
            vec![
                citation("a.pdf"),
                citation("b.pdf"),
                citation("a.pdf"),
                citation("a.pdf"),
            ],
        );
        let parsed = parse_answer(&input).unwrap();
        let parts: Vec<_> = parsed.citations.iter().map(|c| c.part_index).collect();

        assert_eq!(parts, vec![Some(1), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn input_answer_is_not_mutated() {
        let input = answer("[doc1]", vec![citation("a.pdf")]);
        let before = input.clone();
        let _ = parse_answer(&input);

        assert_eq!(input, before);
        assert_eq!(input.citations[0].reindex_id, None);
    }

    #[test]
    fn iddoc_links_become_markdown_links() {
        let input = answer("open [iddoc|123|Report A] now, [iddoc|123|Report A]", vec![]);
        let parsed = parse_answer(&input).unwrap();

        assert_eq!(
            parsed.markdown_format_text,
            "open [Report A](123) now, [Report A](123)"
        );
    }

    #[test]
    fn non_string_answer_yields_none() {
        let input = AskResponse {
            answer: None,
            citations: vec![citation("a.pdf")],
            ..Default::default()
        };
        assert!(parse_answer(&input).is_none());
    }

    #[test]
    fn reparsing_output_does_not_expand_again() {
        let input = answer("x [doc1] y [doc2]", vec![citation("a.pdf"), citation("b.pdf")]);
        let first = parse_answer(&input).unwrap();
        let second = parse_answer(&answer(&first.markdown_format_text, vec![])).unwrap();

        assert!(second.citations.is_empty());
        assert_eq!(second.markdown_format_text, first.markdown_format_text);
    }

    #[test]
    fn generated_chart_passes_through() {
        let mut input = answer("chart below", vec![]);
        input.generated_chart = Some("iVBORw0KGgo=".to_string());

        let parsed = parse_answer(&input).unwrap();
        assert_eq!(parsed.generated_chart.as_deref(), Some("iVBORw0KGgo="));
    }
}
