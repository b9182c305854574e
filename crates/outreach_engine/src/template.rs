use outreach_core::ContactRecord;
use rand::Rng;
use thiserror::Error;

/// One outreach message variant. Weights are whole percent and must
/// sum to 100 across the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub id: String,
    pub weight: u8,
    pub text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template weights sum to {total}, expected 100")]
    WeightsDoNotSum { total: u32 },
    #[error("no templates configured")]
    Empty,
}

/// A validated, weighted set of message templates.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: Vec<MessageTemplate>,
}

impl TemplateSet {
    pub fn new(templates: Vec<MessageTemplate>) -> Result<Self, TemplateError> {
        if templates.is_empty() {
            return Err(TemplateError::Empty);
        }
        let total: u32 = templates.iter().map(|t| u32::from(t.weight)).sum();
        if total != 100 {
            return Err(TemplateError::WeightsDoNotSum { total });
        }
        Ok(TemplateSet { templates })
    }

    /// Draws a template with probability proportional to its weight.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &MessageTemplate {
        let mut roll = rng.gen_range(0u32..100);
        for template in &self.templates {
            let weight = u32::from(template.weight);
            if roll < weight {
                return template;
            }
            roll -= weight;
        }
        // Weights sum to 100, so the loop always returns.
        &self.templates[self.templates.len() - 1]
    }

    pub fn templates(&self) -> &[MessageTemplate] {
        &self.templates
    }
}

/// Fills the `{name}` placeholder with the contact's first name, or a
/// generic greeting when the name is unusable.
pub fn render_message(template: &MessageTemplate, contact: &ContactRecord) -> String {
    let name = contact.first_name().unwrap_or("there");
    template.text.replace("{name}", name)
}
