use crate::models::ImageAnalysis;

pub fn description_prompt(analysis: &ImageAnalysis, product_name: &str, product_type_key: &str) -> String {
    format!(
        "You are writing copy for an online store.\n\
         Write an engaging, factual product description of about 100 words for the product \
         below. Use only what the image analysis supports and do not invent materials, sizes \
         or prices. Return plain text without headings or markdown.\n\n\
         Product name: {product_name}\n\
         Product type: {product_type_key}\n\
         Labels: {labels}\n\
         Objects: {objects}\n\
         Dominant colors (RGB): {colors}\n\
         Text in image: {text}\n\
         Related web entities: {web}",
        labels = analysis.labels,
        objects = analysis.objects,
        colors = analysis.colors.join("; "),
        text = analysis.detected_text,
        web = analysis.web_entities,
    )
}

pub fn translation_prompt(text: &str, language: &str) -> String {
    format!(
        "Translate the following product description into the language with code \
         \"{language}\". Keep the meaning and tone. Return only the translated text.\n\n{text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_prompt_embeds_every_facet() {
        let analysis = ImageAnalysis {
            labels: "Shirt, Sleeve".into(),
            objects: "Top".into(),
            colors: vec!["240, 240, 235".into(), "12, 0, 0".into()],
            detected_text: "No text detected".into(),
            web_entities: "Linen".into(),
        };
        let prompt = description_prompt(&analysis, "Linen Shirt", "shirts");
        for expected in [
            "Linen Shirt",
            "shirts",
            "Shirt, Sleeve",
            "Top",
            "240, 240, 235; 12, 0, 0",
            "No text detected",
            "Linen",
        ] {
            assert!(prompt.contains(expected), "missing `{expected}`");
        }
    }

    #[test]
    fn translation_prompt_names_target_language() {
        let prompt = translation_prompt("A shirt.", "de");
        assert!(prompt.contains("\"de\""));
        assert!(prompt.ends_with("A shirt."));
    }
}
