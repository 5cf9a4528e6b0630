use thiserror::Error;

/// Bad input typed by the user. Always recovered locally with a re-prompt;
/// the session stays intact.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UserInputError {
    #[error("selection `{input}` is not a number")]
    NotANumber { input: String },
    #[error("selection `{input}` is outside the displayed list of {count}")]
    ChoiceOutOfRange { input: String, count: usize },
    #[error("rental duration `{input}` is not a positive whole number of days")]
    InvalidDuration { input: String },
    #[error("input `{input}` does not match any option in the current step")]
    UnrecognizedInput { input: String },
}

/// Catalog data that should exist but does not. Recovered by stepping back
/// one state with an explanation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DataGapError {
    #[error("no orderable models for category `{category}`")]
    NoModelsForCategory { category: String },
    #[error("no photo or spec text for model `{model_key}`")]
    MissingModelDetail { model_key: String },
    #[error("the catalog snapshot is empty")]
    EmptyCatalog,
}

/// A collaborator (geocoder, quote provider, catalog source) failed.
/// Converted into a local corrective path; never shown raw to the user.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("delivery address could not be resolved to coordinates")]
    UnresolvableAddress,
    #[error("delivery quote provider failure: {0}")]
    QuoteProvider(String),
    #[error("payment gateway failure: {0}")]
    PaymentGateway(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecoverableError {
    #[error(transparent)]
    UserInput(#[from] UserInputError),
    #[error(transparent)]
    DataGap(#[from] DataGapError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl RecoverableError {
    /// The corrective text shown to the end user. Internal detail stays in
    /// the `Display` form and the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::UserInput(UserInputError::NotANumber { input }) => {
                format!("`{input}` is not a number. Please reply with the number of the option you want.")
            }
            Self::UserInput(UserInputError::ChoiceOutOfRange { count, .. }) => {
                format!("That number is not on the list. Please pick a number between 1 and {count}.")
            }
            Self::UserInput(UserInputError::InvalidDuration { .. }) => {
                "Please enter the rental duration as a positive whole number of days, e.g. 3."
                    .to_string()
            }
            Self::UserInput(UserInputError::UnrecognizedInput { .. }) => {
                "Sorry, I did not understand that. Please use the buttons or reply with a number from the list."
                    .to_string()
            }
            Self::DataGap(DataGapError::NoModelsForCategory { category }) => {
                format!("Our model list for {category} is incomplete right now. Please pick another tool, or contact our agent.")
            }
            Self::DataGap(DataGapError::MissingModelDetail { model_key }) => {
                format!("We have no specifications on file for {model_key} yet. We are fixing that — meanwhile, here is the catalog again.")
            }
            Self::DataGap(DataGapError::EmptyCatalog) => {
                "The catalog is being updated at the moment. Please try again in a few minutes."
                    .to_string()
            }
            Self::Upstream(UpstreamError::UnresolvableAddress) => {
                "We could not find that address. Please send it again as: street, building, apartment."
                    .to_string()
            }
            Self::Upstream(UpstreamError::QuoteProvider(_)) => {
                "The delivery service is temporarily unavailable. Please send the address again to retry."
                    .to_string()
            }
            Self::Upstream(UpstreamError::PaymentGateway(_)) => {
                "The payment service is temporarily unavailable. Please confirm the order again in a moment."
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_never_leak_internal_detail() {
        let upstream = RecoverableError::from(UpstreamError::QuoteProvider(
            "HTTP 500 from b2b.taxi.yandex.net".to_string(),
        ));
        assert!(!upstream.user_message().contains("yandex"));
        assert!(!upstream.user_message().contains("500"));

        let gap = RecoverableError::from(DataGapError::NoModelsForCategory {
            category: "Drill".to_string(),
        });
        assert!(gap.user_message().contains("Drill"));
    }

    #[test]
    fn out_of_range_message_names_the_valid_span() {
        let error = RecoverableError::from(UserInputError::ChoiceOutOfRange {
            input: "9".to_string(),
            count: 4,
        });
        assert!(error.user_message().contains("between 1 and 4"));
    }
}
