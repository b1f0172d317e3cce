use crate::domain::model::{FilingSet, LocalDocument};

/// Filings mentioned in a chat prompt are capped at this many.
const MAX_LISTED_FILINGS: usize = 5;

/// Question text, optionally scoped to a bank and its known filings.
pub fn chat_prompt(question: &str, bank_name: Option<&str>, reports: Option<&FilingSet>) -> String {
    let Some(bank) = bank_name.filter(|b| !b.trim().is_empty()) else {
        return question.to_string();
    };

    let mut prompt = format!("{} about {}", question, bank);
    if let Some(reports) = reports.filter(|r| !r.is_empty()) {
        let listed: Vec<String> = reports.descriptions().take(MAX_LISTED_FILINGS).collect();
        prompt.push_str(". Available SEC filings: ");
        prompt.push_str(&listed.join(", "));
    }
    prompt
}

/// Framing used when a chat question goes through the job queue.
pub fn wrapped_chat_prompt(prompt: &str, bank_name: Option<&str>) -> String {
    format!(
        "Answer this banking question: \"{}\" about {}",
        prompt,
        bank_name.filter(|b| !b.trim().is_empty()).unwrap_or("general banking")
    )
}

pub fn peer_analysis_prompt(
    base_bank: &str,
    peer_banks: &[String],
    metric: &str,
    include_format: bool,
) -> String {
    let mut prompt = format!(
        "Use the compare_banks tool with these exact parameters:\n\
         - base_bank: \"{}\"\n\
         - peer_banks: [\"{}\"]\n\
         - metric: \"{}\"\n\
         \n\
         CRITICAL INSTRUCTIONS:\n\
         1. Call the compare_banks tool\n\
         2. Return the tool's JSON output EXACTLY as-is on the first line\n\
         3. Then provide your expanded analysis below it",
        base_bank,
        peer_banks.join("\", \""),
        metric
    );
    if include_format {
        prompt.push_str(
            "\n\nFormat:\n\
             {\"data\": [...], \"base_bank\": \"...\", \"peer_banks\": [...], \"analysis\": \"...\", \"source\": \"...\"}\n\
             \n\
             Your detailed analysis here...",
        );
    }
    prompt
}

pub fn sec_filings_prompt(bank_name: &str) -> String {
    format!(
        "Get all SEC filings for {} for years 2023, 2024, and 2025. \
         I need both 10-K annual reports and 10-Q quarterly reports.",
        bank_name
    )
}

pub fn full_report_prompt(bank_name: &str) -> String {
    format!(
        "Generate a comprehensive financial analysis report for {} using available tools.",
        bank_name
    )
}

pub fn compliance_prompt(bank_name: &str) -> String {
    format!(
        "Use compliance_risk_assessment(\"{}\") tool. Return ONLY the raw JSON output with NO explanation. \
         Expected format: {{\"success\": true, \"overall_score\": X, \"scores\": {{...}}, \"metrics\": {{...}}, \"alerts\": [...]}}",
        bank_name
    )
}

/// Question about an uploaded document. The caller guarantees `s3_key` is set.
pub fn local_document_prompt(message: &str, doc: &LocalDocument, s3_key: &str) -> String {
    format!(
        "Answer this question about {bank}'s {form} filing: {message}\n\
         \n\
         IMPORTANT: Use get_local_document_data(s3_key=\"{key}\", bank_name=\"{bank}\") to retrieve \
         the document data, then provide a 3-4 paragraph professional analysis.",
        bank = doc.bank_name,
        form = doc.form_type,
        message = message,
        key = s3_key
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Filing;

    fn filing(form: &str, date: &str) -> Filing {
        Filing {
            form: form.to_string(),
            filing_date: date.to_string(),
            accession: String::new(),
            url: String::new(),
        }
    }

    #[test]
    fn test_chat_prompt_without_bank_is_the_question() {
        assert_eq!(chat_prompt("What is CET1?", None, None), "What is CET1?");
        assert_eq!(chat_prompt("What is CET1?", Some("  "), None), "What is CET1?");
    }

    #[test]
    fn test_chat_prompt_lists_at_most_five_filings() {
        let reports = FilingSet {
            response: String::new(),
            ten_k: vec![filing("10-K", "2025-02-14"), filing("10-K", "2024-02-16")],
            ten_q: vec![
                filing("10-Q", "2025-05-01"),
                filing("10-Q", "2024-11-01"),
                filing("10-Q", "2024-08-02"),
                filing("10-Q", "2024-05-03"),
            ],
        };
        let prompt = chat_prompt("Summarise liquidity", Some("Citigroup"), Some(&reports));
        assert_eq!(
            prompt,
            "Summarise liquidity about Citigroup. Available SEC filings: \
             10-K filed 2025-02-14, 10-K filed 2024-02-16, 10-Q filed 2025-05-01, \
             10-Q filed 2024-11-01, 10-Q filed 2024-08-02"
        );
    }

    #[test]
    fn test_chat_prompt_skips_empty_report_list() {
        let prompt = chat_prompt("Risks?", Some("Citigroup"), Some(&FilingSet::default()));
        assert_eq!(prompt, "Risks? about Citigroup");
    }

    #[test]
    fn test_wrapped_chat_prompt_defaults_to_general_banking() {
        assert_eq!(
            wrapped_chat_prompt("What is NIM?", None),
            "Answer this banking question: \"What is NIM?\" about general banking"
        );
        assert_eq!(
            wrapped_chat_prompt("What is NIM?", Some("  ")),
            "Answer this banking question: \"What is NIM?\" about general banking"
        );
    }

    #[test]
    fn test_peer_analysis_prompt_quotes_every_peer() {
        let peers = vec!["Bank of America".to_string(), "Wells Fargo".to_string()];
        let prompt = peer_analysis_prompt("JPMorgan Chase", &peers, "ROA", false);
        assert!(prompt.contains("- peer_banks: [\"Bank of America\", \"Wells Fargo\"]"));
        assert!(prompt.contains("- metric: \"ROA\""));
        assert!(!prompt.contains("Format:"));
        assert!(peer_analysis_prompt("JPMorgan Chase", &peers, "ROA", true).contains("Format:"));
    }

    #[test]
    fn test_local_document_prompt_mentions_key() {
        let doc = LocalDocument {
            bank_name: "Citigroup".to_string(),
            form_type: "10-K".to_string(),
            s3_key: Some("uploads/citi.pdf".to_string()),
        };
        let prompt = local_document_prompt("Any going-concern notes?", &doc, "uploads/citi.pdf");
        assert!(prompt.starts_with("Answer this question about Citigroup's 10-K filing: Any going-concern notes?"));
        assert!(prompt.contains("s3_key=\"uploads/citi.pdf\""));
    }
}
