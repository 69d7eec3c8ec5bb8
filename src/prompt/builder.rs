//! Prompt text and structured-output schemas for the remote model.
//!
//! The restyle prompt pins everything except the hair so the model edits the
//! style in place instead of inventing a new person. The analysis prompts pair
//! with a response schema so the model is forced into parseable JSON.
use serde_json::{json, Value};

/// Image-edit prompt: fix the face, vary only the style.
pub fn restyle_prompt(style_descriptor: &str) -> String {
    format!(
        "Edit this photo to give the person the following hairstyle: {style_descriptor}. \
         Keep the face, identity, skin tone, facial expression, lighting and background \
         exactly as they are in the original photo. Change only the hair. \
         The result must be photorealistic."
    )
}

pub fn face_shape_prompt(gender: &str, age: Option<u32>) -> String {
    let mut prompt = format!(
        "Analyze the face in this photo and classify its shape as one of: \
         oval, round, square, heart, diamond, oblong. The person is {gender}"
    );
    if let Some(age) = age {
        prompt.push_str(&format!(", around {age} years old"));
    }
    prompt.push_str(". Respond with the classification, a confidence between 0 and 1, and a short reasoning.");
    prompt
}

pub fn face_shape_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "faceShape": {
                "type": "STRING",
                "enum": ["oval", "round", "square", "heart", "diamond", "oblong"]
            },
            "confidence": { "type": "NUMBER" },
            "reasoning": { "type": "STRING" }
        },
        "required": ["faceShape", "confidence", "reasoning"]
    })
}

pub fn suggestions_prompt(gender: &str, age: Option<u32>) -> String {
    let mut prompt = format!(
        "Look at the face in this photo and suggest five hairstyles that would \
         suit it. The person is {gender}"
    );
    if let Some(age) = age {
        prompt.push_str(&format!(", around {age} years old"));
    }
    prompt.push_str(
        ". For each suggestion give a short name, a one-sentence description, \
         and why it suits this face.",
    );
    prompt
}

pub fn suggestions_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "suggestions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "suitability": { "type": "STRING" }
                    },
                    "required": ["name", "description", "suitability"]
                }
            }
        },
        "required": ["suggestions"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restyle_prompt_carries_the_descriptor_and_pins_the_face() {
        let prompt = restyle_prompt("curly bob with bangs");
        assert!(prompt.contains("curly bob with bangs"));
        assert!(prompt.contains("Change only the hair"));
    }

    #[test]
    fn analysis_prompts_include_optional_age() {
        assert!(face_shape_prompt("female", Some(34)).contains("around 34 years old"));
        assert!(!face_shape_prompt("female", None).contains("years old"));
        assert!(suggestions_prompt("male", Some(50)).contains("around 50 years old"));
    }

    #[test]
    fn schemas_require_their_fields() {
        let schema = face_shape_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["faceShape", "confidence", "reasoning"]);
        assert!(suggestions_schema()["properties"]["suggestions"].is_object());
    }
}
