//! Instruction profiles sent with every annotation request

use crate::types::CaptionLength;

/// Length rule for one caption mode
fn length_instruction(length: CaptionLength) -> &'static str {
    match length {
        CaptionLength::OneLine => {
            "STRICTLY LIMIT to 5-8 words. Pure essence. Subject + primary action/attribute only. No fluff."
        }
        CaptionLength::VeryShort => {
            "STRICTLY LIMIT to 10-15 words. Focus only on the core subject and its most defining feature. Minimalist approach."
        }
        CaptionLength::Short => {
            "LIMIT to 20-30 words. Describe the main subject, its primary color/texture, and the immediate environment."
        }
        CaptionLength::Long => {
            "Keep between 40-60 words. Detailed description of the subject, textures, secondary objects, specific poses/actions, and atmospheric lighting."
        }
        CaptionLength::VeryLong => {
            "EXTENSIVE detail, 80-100 words. Exhaustively describe every visual element: intricate patterns, material properties, lighting sources, depth of field, and complex background details."
        }
    }
}

/// System instruction for a caption mode
pub fn system_instruction(length: CaptionLength) -> String {
    format!(
        r#"You are a world-class image annotator for AI model training (LoRa/Stable Diffusion). Your task is to analyze the input image and generate a SINGLE, detailed, and descriptive caption line.

GUIDELINES:
1. STRUCTURE: Start with the subject, then its specific attributes (clothing, material, texture), then its pose or state, and finally the background and lighting context.
2. SCOPE: You must handle ALL image types (portraits, landscapes, objects, architecture, animals).
3. CULTURAL EXPERTISE: If the image features Indian attire or jewelry, use precise terminology:
   - Garments: "Sherwani", "Saree", "Lehenga", "Anarkali", "Kurta", "Dhoti", "Angrakha", "Dupatta".
   - Jewelry: "Kundan", "Polki", "Maang Tikka", "Nath", "Jhumkas", "Temple jewelry".
   - Headwear: "Turban", "Pagri", "Safa".
   For all other contexts, use standard, high-quality descriptive English.
4. STYLE: Be objective and visual. Avoid subjective or flowery language (e.g., avoid "majestic", "beautiful", "stunning"). State only what is visually verifiable.
5. FORMAT: {} Output MUST be exactly one sentence.

OUTPUT FORMAT:
[Subject description] [attributes/clothing] [pose/action], [background/lighting context]."#,
        length_instruction(length)
    )
}

/// User turn accompanying the image
pub fn user_prompt(length: CaptionLength) -> String {
    format!(
        "Generate an expert {} annotation for this image. Strictly follow the single-sentence rule and structural guidelines.",
        length.label()
    )
}
