//! The fixed analysis prompt sent with every outfit image.
//!
//! The structure (four `##` sections) is part of the product contract: the
//! gateway and downstream consumers look for `## COLOR IDENTIFICATION` to
//! extract a display summary.

/// Structured prompt for the vision model. Requests color identification,
/// coordination assessment, style analysis, and colorblind-specific advice.
pub const OUTFIT_ANALYSIS_PROMPT: &str = "\
I am analyzing fashion for a colorblind person who needs help understanding colors and outfit coordination.

Please provide a detailed analysis of this outfit image with the following structure:

## COLOR IDENTIFICATION
- Describe each clothing item with VERY specific color names (e.g., \"royal blue\", \"burgundy red\", \"forest green\")
- For each item, mention color families it belongs to (e.g., \"This is in the blue family, which pairs well with...\")
- Describe patterns, textures, and color variations in detail

## COLOR COORDINATION ASSESSMENT
- Explain if the current color combinations work well together and why
- Rate the color harmony on a scale of 1-10
- Explain color theory principles relevant to this outfit (complementary, analogous, etc.)

## STYLE ANALYSIS
- Describe the overall style category (casual, formal, sporty, etc.)
- Identify key fashion elements and how they work together

## COLORBLIND-SPECIFIC ADVICE
- Suggest simple ways to remember these color combinations
- Provide tips for selecting similar matching outfits independently
- Mention any potential challenging color distinctions in this outfit

Be detailed but concise. Use objective descriptions that would be helpful for someone who cannot distinguish certain colors.";

/// Extract the color identification section for a short display summary,
/// if the model honored the requested structure.
pub fn color_summary(analysis: &str) -> Option<&str> {
    let start = analysis.find("## COLOR IDENTIFICATION")?;
    let body = &analysis[start + "## COLOR IDENTIFICATION".len()..];
    let end = body.find("##").unwrap_or(body.len());
    let section = body[..end].trim();
    (!section.is_empty()).then_some(section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_requests_all_four_sections() {
        for section in [
            "## COLOR IDENTIFICATION",
            "## COLOR COORDINATION ASSESSMENT",
            "## STYLE ANALYSIS",
            "## COLORBLIND-SPECIFIC ADVICE",
        ] {
            assert!(OUTFIT_ANALYSIS_PROMPT.contains(section), "{section}");
        }
    }

    #[test]
    fn color_summary_extracts_first_section() {
        let analysis = "## COLOR IDENTIFICATION\nA royal blue shirt.\n## STYLE ANALYSIS\nCasual.";
        assert_eq!(color_summary(analysis), Some("A royal blue shirt."));
        assert_eq!(color_summary("no sections here"), None);
    }
}
