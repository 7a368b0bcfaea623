//! Prompt templates for recipe extraction and note-style summaries.

use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

use crate::response::OutputFormat;

/// Source material embedded in a recipe prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PromptData {
    Video {
        description: String,
        transcribed_text: String,
    },
    Webpage {
        webpage_content: String,
        article_title: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct RecipePrompt<'a> {
    pub data: &'a PromptData,
    /// English name of the output language, e.g. "Italian"
    pub language: &'a str,
    pub schema: &'a str,
    pub format: OutputFormat,
    /// Archive name chosen by the user, passed along as a naming hint
    pub filename: Option<&'a str>,
}

fn data_section(data: &PromptData, filename: Option<&str>) -> String {
    let mut value = serde_json::to_value(data).unwrap_or(Value::Null);
    if let (Some(name), Value::Object(map)) = (filename, &mut value) {
        map.insert("filename".to_string(), Value::String(name.to_string()));
    }
    serde_json::to_string_pretty(&value).unwrap_or_default()
}

pub fn create_recipe_prompt(prompt: &RecipePrompt<'_>) -> String {
    let format = prompt.format.as_str();

    format!(
        "Analyze the following recipe information and extract it into a structured {format} format.

Data:
{data}

If any information is not available, use null for that field.
Focus on extracting clear, actionable recipe information.
Return only valid {format}, no additional text or formatting.
Please translate it to {language} language.

Please extract and structure this information into {format} with the strictly following format. Add only values specified in the schema:
{schema}
",
        format = format,
        data = data_section(prompt.data, prompt.filename),
        language = prompt.language,
        schema = prompt.schema,
    )
}

fn summary_template(data_section: &str, language: &str) -> String {
    format!(
        "Analyze the following content and create comprehensive notes in markdown format.

{data_section}

Please create well-structured notes following this markdown format:

# [Title/Topic]

## Overview
Provide a brief 2-3 sentence summary of the main content.

## Detailed Notes
Write comprehensive narrative notes organized by topics or sections. Include:
- Main themes and concepts
- Important details and context
- Connections between different ideas
- Notable examples or case studies

## Action Items
- Practical takeaways or lessons learned
- Recommended next steps (if applicable)
- Leave out calls to action such as liking, subscribing or following the creator

## Resources
- All resources recommended (urls, apps, books ...) or topics to explore (if mentioned) in a list

Please translate the entire text to {language} language.
Return only the markdown content, no additional text or formatting markers."
    )
}

/// Build the summary prompt. A custom prompt replaces the default notes template.
pub fn create_summary_prompt(data: &PromptData, language: &str, custom_prompt: Option<&str>) -> String {
    let section = format!("Data:\n{}", data_section(data, None));

    match custom_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(custom) => format!(
            "{}\n\nPlease translate the entire text to {} language.\n{}",
            custom, language, section
        ),
        None => summary_template(&section, language),
    }
}

pub const MARKDOWN_RECIPE_INSTRUCTION: &str = "Format the recipe description field as markdown with the following structure:

# [Recipe Name]

## Overview
Brief description of the dish (1-2 sentences)

## Key Information
- **Prep Time:** X minutes
- **Cook Time:** X minutes
- **Total Time:** X minutes
- **Servings:** X
- **Difficulty:** Easy/Medium/Hard
- **Cuisine:** [Type]

## Ingredients
### Main Ingredients
- ingredient 1
- ingredient 2

### Optional/Garnish
- optional ingredient 1

## Instructions
1. First step with clear action
2. Second step with temperature/time details
3. Continue with numbered steps

## Tips & Notes
- Any special techniques or substitutions
- Storage instructions
- Serving suggestions";

/// JSON schema used when the user does not supply one
pub fn default_recipe_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Recipe Schema",
        "type": "object",
        "properties": {
            "title": { "type": "string", "description": "Recipe title" },
            "description": { "type": "string", "description": "Brief description" },
            "prep_time": { "type": "number", "description": "Preparation time in minutes" },
            "cook_time": { "type": "number", "description": "Cooking time in minutes" },
            "total_time": { "type": "number", "description": "Total time in minutes" },
            "servings": { "type": "number", "description": "Number of servings" },
            "ingredients": {
                "type": "array",
                "description": "List of ingredients",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "amount": { "type": ["string", "number"] },
                        "unit": { "type": "string" }
                    },
                    "required": ["name"]
                }
            },
            "instructions": {
                "type": "array",
                "description": "List of recipe components with their instructions",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "Component name (e.g., 'Tzatziki Sauce', 'Main Dish')"
                        },
                        "steps": {
                            "type": "array",
                            "description": "Step-by-step instructions for this component",
                            "items": { "type": "string" },
                            "minItems": 1
                        }
                    },
                    "required": ["name", "steps"]
                },
                "minItems": 1
            },
            "tags": {
                "type": "array",
                "description": "Custom tags for classification",
                "items": {
                    "type": "string",
                    "enum": [
                        "Chicken", "Pork", "Beef", "Fish", "Vegan", "Dessert", "Lactose-free",
                        "Low-Sugar", "Cake", "Vegetarian", "Eggs", "Air-fryer", "Slowcooker", "Meal-prep"
                    ]
                },
                "uniqueItems": true
            },
            "difficulty": {
                "type": "string",
                "description": "Difficulty level",
                "enum": ["easy", "medium", "hard"]
            },
            "cuisine": { "type": "string", "description": "Type of cuisine (e.g., Italian, Indian)" }
        },
        "required": ["title", "ingredients", "instructions"],
        "additionalProperties": false
    })
}

/// Schema text embedded in recipe prompts.
///
/// A user-supplied file must contain valid JSON. Markdown output gets the
/// markdown layout instruction appended.
pub fn load_recipe_schema(path: Option<&Path>, format: OutputFormat) -> crate::Result<String> {
    let schema = match path {
        Some(path) => {
            let raw = fs_err::read_to_string(path)?;
            serde_json::from_str::<Value>(&raw)
                .with_context(|| format!("Recipe schema {} is not valid JSON", path.display()))?
        }
        None => default_recipe_schema(),
    };

    let mut text = serde_json::to_string_pretty(&schema)?;
    if format == OutputFormat::Markdown {
        text.push_str("\n\n");
        text.push_str(MARKDOWN_RECIPE_INSTRUCTION);
    }
    Ok(text)
}
