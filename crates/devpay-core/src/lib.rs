pub mod alignment;
pub mod cardinality;
pub mod config;
pub mod currency;
pub mod encoder;
pub mod error;
pub mod field;
pub mod normalize;
pub mod record;
pub mod schema;
pub mod validation;
pub mod vocabulary;

pub use alignment::FeatureSchema;
pub use cardinality::CardinalityReducer;
pub use config::ModelConfig;
pub use currency::{CurrencyInfo, CurrencyTable, LocalSalary};
pub use encoder::{EncodeMode, FeatureEncoder, FeatureMatrix};
pub use error::PipelineError;
pub use field::CategoricalField;
pub use normalize::{normalize_category, normalize_column};
pub use record::{ProfileRequest, RawRecord, SalaryInput, SurveyRow};
pub use validation::ValidationGate;
pub use vocabulary::Vocabulary;
