//! Run configuration for export and import.

/// Name of the thermal scalar field output
pub const NT11: &str = "NT11";

/// Export configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Field output to extract
    pub field_name: String,
    /// Steps to export; exported steps keep native order whatever order
    /// the names are listed in. `None` exports every step
    pub step_filter: Option<Vec<String>>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            field_name: NT11.to_string(),
            step_filter: None,
        }
    }
}

impl ExportConfig {
    /// Restrict export to the comma-separated step names in `list`
    pub fn with_step_list(mut self, list: &str) -> Self {
        let names: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self.step_filter = if names.is_empty() { None } else { Some(names) };
        self
    }
}

/// Import configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    /// Field output to create in every frame
    pub field_name: String,
    pub field_description: String,
    /// Each instance gets its own part named `<part_prefix><instance>`
    pub part_prefix: String,
    /// Section category holding every imported section point
    pub section_category: String,
    /// Target container name and header text
    pub model_name: String,
    pub analysis_title: String,
    pub description: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            field_name: NT11.to_string(),
            field_description: "Imported temperature".to_string(),
            part_prefix: "PART_FROM_".to_string(),
            section_category: "GEN_SEC_CAT".to_string(),
            model_name: "derivedNT11".to_string(),
            analysis_title: "Imported from JSON(L)".to_string(),
            description: "Mesh + NT11 reconstructed from export".to_string(),
        }
    }
}

impl ImportConfig {
    pub fn part_name(&self, instance: &str) -> String {
        format!("{}{}", self.part_prefix, instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_list_is_trimmed() {
        let config = ExportConfig::default().with_step_list(" Heat , Cool,,");
        assert_eq!(
            config.step_filter,
            Some(vec!["Heat".to_string(), "Cool".to_string()])
        );
        assert_eq!(ExportConfig::default().with_step_list("").step_filter, None);
    }

    #[test]
    fn part_name_uses_prefix() {
        assert_eq!(
            ImportConfig::default().part_name("PART-1-1"),
            "PART_FROM_PART-1-1"
        );
    }
}
