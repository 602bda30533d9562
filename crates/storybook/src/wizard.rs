//! The story wizard: a step-by-step collector for [`StoryParameters`].
//!
//! Each step owns one field. [`StoryWizard::advance`] refuses to leave a step
//! whose field is missing or invalid, so a wizard that reaches
//! [`WizardStep::Review`] always yields valid parameters.

use serde::{Deserialize, Serialize};

use crate::{book::check_text, AgeGroup, Language, PageCount, StoryParameters, StorybookError};

/// Wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Theme,
    Character,
    Age,
    Moral,
    Language,
    PageCount,
    Review,
}

impl WizardStep {
    const ORDER: [WizardStep; 7] = [
        Self::Theme,
        Self::Character,
        Self::Age,
        Self::Moral,
        Self::Language,
        Self::PageCount,
        Self::Review,
    ];

    fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }

    /// The following step, or `None` at [`WizardStep::Review`].
    pub fn next(self) -> Option<Self> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    /// The preceding step, or `None` at [`WizardStep::Theme`].
    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).map(|i| Self::ORDER[i])
    }

    /// 1-based position, for "step 3 of 7" displays.
    pub fn position(self) -> usize {
        self.index() + 1
    }

    /// Number of steps.
    pub fn count() -> usize {
        Self::ORDER.len()
    }
}

/// In-progress wizard state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryWizard {
    step: WizardStep,
    theme: Option<String>,
    character: Option<String>,
    age_group: Option<AgeGroup>,
    moral: Option<String>,
    language: Language,
    page_count: PageCount,
    narration: bool,
    art_style: Option<String>,
}

impl Default for StoryWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryWizard {
    /// A wizard at the first step with default language, length and narration.
    pub fn new() -> Self {
        Self {
            step: WizardStep::Theme,
            theme: None,
            character: None,
            age_group: None,
            moral: None,
            language: Language::default(),
            page_count: PageCount::default(),
            narration: true,
            art_style: None,
        }
    }

    /// Fills a wizard from complete parameters and walks every step, so the
    /// same validation applies whether parameters arrive interactively or all
    /// at once.
    pub fn from_parameters(params: StoryParameters) -> Result<Self, StorybookError> {
        let mut wizard = Self::new();
        wizard.set_theme(params.theme);
        wizard.advance()?;
        wizard.set_character(params.character);
        wizard.advance()?;
        wizard.set_age_group(params.age_group);
        wizard.advance()?;
        wizard.set_moral(params.moral);
        wizard.advance()?;
        wizard.set_language(params.language);
        wizard.advance()?;
        wizard.set_page_count(params.page_count);
        wizard.set_narration(params.narration);
        wizard.set_art_style(params.art_style);
        wizard.advance()?;
        Ok(wizard)
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn set_theme(&mut self, theme: impl Into<String>) {
        self.theme = Some(theme.into());
    }

    pub fn set_character(&mut self, character: impl Into<String>) {
        self.character = Some(character.into());
    }

    pub fn set_age_group(&mut self, age_group: AgeGroup) {
        self.age_group = Some(age_group);
    }

    pub fn set_moral(&mut self, moral: impl Into<String>) {
        self.moral = Some(moral.into());
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn set_page_count(&mut self, page_count: PageCount) {
        self.page_count = page_count;
    }

    pub fn set_narration(&mut self, narration: bool) {
        self.narration = narration;
    }

    /// Sets the illustration style; blank values clear it.
    pub fn set_art_style(&mut self, art_style: Option<String>) {
        self.art_style = art_style.filter(|s| !s.trim().is_empty());
    }

    /// Validates the current step and moves to the next one.
    pub fn advance(&mut self) -> Result<WizardStep, StorybookError> {
        self.validate_step(self.step)?;
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Ok(self.step)
    }

    /// Moves back one step. Entered values are kept.
    pub fn back(&mut self) -> WizardStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Produces the collected parameters. Only valid at [`WizardStep::Review`].
    pub fn finish(&self) -> Result<StoryParameters, StorybookError> {
        if self.step != WizardStep::Review {
            return Err(StorybookError::InvalidParameters {
                field: "wizard",
                reason: format!(
                    "cannot finish at step {} of {}",
                    self.step.position(),
                    WizardStep::count()
                ),
            });
        }
        let params = StoryParameters {
            theme: required("theme", &self.theme)?.trim().to_string(),
            character: required("character", &self.character)?.trim().to_string(),
            age_group: self.age_group.ok_or_else(|| missing("age_group"))?,
            moral: required("moral", &self.moral)?.trim().to_string(),
            language: self.language,
            page_count: self.page_count,
            narration: self.narration,
            art_style: self.art_style.as_ref().map(|s| s.trim().to_string()),
        };
        params.validate()?;
        Ok(params)
    }

    fn validate_step(&self, step: WizardStep) -> Result<(), StorybookError> {
        match step {
            WizardStep::Theme => check_text("theme", required("theme", &self.theme)?),
            WizardStep::Character => {
                check_text("character", required("character", &self.character)?)
            }
            WizardStep::Age => self.age_group.map(|_| ()).ok_or_else(|| missing("age_group")),
            WizardStep::Moral => check_text("moral", required("moral", &self.moral)?),
            // Always set; the types enforce validity.
            WizardStep::Language | WizardStep::Review => Ok(()),
            WizardStep::PageCount => match &self.art_style {
                Some(style) => check_text("art_style", style),
                None => Ok(()),
            },
        }
    }
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, StorybookError> {
    value.as_deref().ok_or_else(|| missing(field))
}

fn missing(field: &'static str) -> StorybookError {
    StorybookError::InvalidParameters {
        field,
        reason: "is required".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_parameters;

    #[test]
    fn advancing_requires_the_current_field() {
        let mut wizard = StoryWizard::new();
        assert!(matches!(
            wizard.advance(),
            Err(StorybookError::InvalidParameters { field: "theme", .. })
        ));
        assert_eq!(wizard.step(), WizardStep::Theme);

        wizard.set_theme("dragons");
        assert_eq!(wizard.advance().unwrap(), WizardStep::Character);
    }

    #[test]
    fn blank_text_does_not_pass_a_step() {
        let mut wizard = StoryWizard::new();
        wizard.set_theme("   ");
        assert!(wizard.advance().is_err());
    }

    #[test]
    fn back_keeps_values_and_stops_at_first_step() {
        let mut wizard = StoryWizard::new();
        wizard.set_theme("space");
        wizard.advance().unwrap();
        assert_eq!(wizard.back(), WizardStep::Theme);
        assert_eq!(wizard.back(), WizardStep::Theme);
        assert_eq!(wizard.advance().unwrap(), WizardStep::Character);
    }

    #[test]
    fn finish_is_only_allowed_at_review() {
        let mut wizard = StoryWizard::new();
        wizard.set_theme("space");
        wizard.advance().unwrap();
        assert!(wizard.finish().is_err());
    }

    #[test]
    fn from_parameters_walks_to_review_and_round_trips() {
        let params = sample_parameters();
        let wizard = StoryWizard::from_parameters(params.clone()).unwrap();
        assert_eq!(wizard.step(), WizardStep::Review);
        assert_eq!(wizard.finish().unwrap(), params);
    }

    #[test]
    fn from_parameters_reports_the_first_invalid_field() {
        let mut params = sample_parameters();
        params.character = String::new();
        params.moral = String::new();
        assert!(matches!(
            StoryWizard::from_parameters(params),
            Err(StorybookError::InvalidParameters { field: "character", .. })
        ));
    }

    #[test]
    fn finish_trims_free_text() {
        let mut params = sample_parameters();
        params.theme = "  a windy day  ".into();
        let wizard = StoryWizard::from_parameters(params).unwrap();
        assert_eq!(wizard.finish().unwrap().theme, "a windy day");
    }

    #[test]
    fn step_positions_are_one_based() {
        assert_eq!(WizardStep::Theme.position(), 1);
        assert_eq!(WizardStep::Review.position(), WizardStep::count());
        assert_eq!(WizardStep::Review.next(), None);
        assert_eq!(WizardStep::Theme.previous(), None);
    }
}
