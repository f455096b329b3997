//! Terminal rendering of search results

use reviewbot_search::CanonicalResult;

const RULE_WIDTH: usize = 80;

pub const NO_RESULTS: &str = "No relevant reviews found.";

/// Whole ratings print without a fractional part ("5", not "5.0").
fn format_rating(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Render one result as its numbered block, separator included.
pub fn format_result(index: usize, result: &CanonicalResult) -> String {
    let mut out = format!(
        "Result {} (Similarity: {})\nHotel: {}\nReview: {}\nAuthor: {} - Date: {}\n",
        index,
        result.similarity,
        result.hotel_name,
        result.review_content,
        result.review_author,
        result.review_date
    );
    if !result.ratings.is_empty() {
        out.push_str("Ratings:\n");
        for (category, value) in &result.ratings {
            out.push_str(&format!("- {}: {}\n", category, format_rating(*value)));
        }
    }
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    out
}

/// Render a full answer: header rule, count, then each result in rank order.
pub fn format_results(results: &[CanonicalResult]) -> String {
    if results.is_empty() {
        return format!("{}\n", NO_RESULTS);
    }

    let mut out = format!(
        "\n{}\nFound {} relevant reviews:\n\n",
        "=".repeat(RULE_WIDTH),
        results.len()
    );
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format_result(i + 1, result));
    }
    out
}
