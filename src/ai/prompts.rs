const ANALYSIS_SHAPE: &str = r#"{
    "items": [
        {
            "name": "food name",
            "quantity": "estimated portion",
            "confidence": 75,
            "calories": 250,
            "protein": 12,
            "carbs": 30,
            "fat": 8,
            "fiber": 3
        }
    ],
    "total_calories": 250,
    "total_protein": 12,
    "total_carbs": 30,
    "total_fat": 8,
    "total_fiber": 3,
    "confidence_overall": 75,
    "need_clarification": false,
    "unclear_items": []
}"#;

fn diet_note(diet_preference: Option<&str>) -> String {
    match diet_preference.map(str::trim).filter(|d| !d.is_empty()) {
        Some(diet) => format!(
            "Note: the user prefers {diet} food; say whether each item is vegetarian.\n"
        ),
        None => String::new(),
    }
}

pub fn analyze_text(description: &str, diet_preference: Option<&str>) -> String {
    format!(
        "You are a food nutrition expert. Estimate the nutrition of the meal described below.\n\
         {diet}\
         Meal: {description}\n\n\
         Only set need_clarification to true when the description is genuinely vague \
         (no dish named, no quantity). All numeric values must be numbers, not strings.\n\
         Respond with JSON in exactly this shape:\n{ANALYSIS_SHAPE}",
        diet = diet_note(diet_preference),
    )
}

pub fn analyze_image(diet_preference: Option<&str>) -> String {
    format!(
        "You are a food nutrition expert. Identify every food in the attached photo and \
         estimate portion sizes and nutrition.\n\
         {diet}\
         Only set need_clarification to true when the photo is too unclear to identify the \
         foods or estimate portions. All numeric values must be numbers, not strings.\n\
         Respond with JSON in exactly this shape:\n{ANALYSIS_SHAPE}",
        diet = diet_note(diet_preference),
    )
}

pub fn refine(original_json: &str, qa: &[(String, String)]) -> String {
    let clarifications: String = qa
        .iter()
        .map(|(q, a)| format!("Q: {q}\nA: {a}\n"))
        .collect();
    format!(
        "Update the food analysis below using the user's clarifications.\n\
         Original analysis:\n{original_json}\n\
         Clarifications:\n{clarifications}\n\
         Respond with the updated analysis as JSON in exactly this shape:\n{ANALYSIS_SHAPE}"
    )
}

pub fn meal_insights(analysis_json: &str) -> String {
    format!(
        "As a nutrition expert, give concise insights for this meal.\n\
         Food analysis:\n{analysis_json}\n\n\
         Respond with JSON in this shape:\n\
         {{\n\
             \"macro_balance\": {{\"status\": \"good/needs_improvement\", \"details\": \"...\", \"recommendations\": [\"...\"]}},\n\
             \"micronutrients\": {{\"highlights\": [\"...\"], \"deficiencies\": [\"...\"]}},\n\
             \"health_benefits\": [\"...\"],\n\
             \"concerns\": [\"...\"],\n\
             \"recommendations\": [\"...\"]\n\
         }}"
    )
}

pub fn healthy_swaps(items_json: &str) -> String {
    format!(
        "You are a nutrition expert. Suggest culturally appropriate healthier swaps for these \
         foods: {items_json}\n\
         Return ONLY JSON with a \"swaps\" array; every swap has exactly the string fields \
         \"original\", \"swap\", \"reason\" and \"cultural_benefit\"."
    )
}

pub fn recipe(analysis_json: &str) -> String {
    format!(
        "You are a chef focused on healthy home cooking. Write a healthy recipe using the \
         foods in this analysis:\n{analysis_json}\n\n\
         Use English only and exactly these headings:\n\
         ## [Recipe Title]\n### Ingredients\n### Instructions\n### Nutrition Info\n\
         ### Health Benefits\n### Regional Variations"
    )
}

pub fn meal_plan(profile_json: &str) -> String {
    format!(
        "You are a nutrition expert. Write a realistic weekly meal plan for this user \
         profile: {profile_json}\n\
         Format as Markdown: \"## Weekly Meal Plan\", then \"### Day 1\" through \"### Day 7\", \
         each listing breakfast, lunch, evening snack and dinner with calories."
    )
}

#[cfg(test)]
mod prompt_tests {
    use super::*;

    #[test]
    fn diet_note_only_when_present() {
        assert!(analyze_text("2 rotis with dal", None).contains("Meal: 2 rotis with dal"));
        assert!(!analyze_text("dal", Some("  ")).contains("prefers"));
        assert!(analyze_image(Some("vegetarian")).contains("prefers vegetarian food"));
    }

    #[test]
    fn refine_lists_each_pair() {
        let prompt = refine(
            "{}",
            &[("How much rice?".into(), "One cup".into())],
        );
        assert!(prompt.contains("Q: How much rice?\nA: One cup\n"));
    }
}
