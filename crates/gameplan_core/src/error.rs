use std::fmt;

use jiff::civil::Date;

/// Errors raised while constructing or mutating engine objects
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A label is already registered and the conflict policy is `Error`
    DuplicateLabel(String),
    /// Exactly one of amount / percentage must be supplied
    AmountOrPercentage,
    InvalidPercentile {
        value: u8,
        valid: Vec<u8>,
    },
    InvalidDateRange {
        start: Date,
        end: Date,
    },
    LengthMismatch {
        dates: usize,
        values: usize,
    },
    /// Dates must be strictly increasing and unique
    UnorderedDates,
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    UnknownAssetType(String),
    /// A flow of the wrong kind was handed to a typed slot
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateLabel(label) => write!(
                f,
                "label '{label}' already exists; use OnConflict::Overwrite to replace it"
            ),
            ValidationError::AmountOrPercentage => {
                write!(f, "exactly one of amount or percentage must be provided")
            }
            ValidationError::InvalidPercentile { value, valid } => {
                write!(f, "income percentile {value} must be one of {valid:?}")
            }
            ValidationError::InvalidDateRange { start, end } => {
                write!(f, "end date {end} is before start date {start}")
            }
            ValidationError::LengthMismatch { dates, values } => {
                write!(f, "{values} values supplied for {dates} dates")
            }
            ValidationError::UnorderedDates => {
                write!(f, "dates must be strictly increasing and unique")
            }
            ValidationError::InvalidParameter {
                name,
                value,
                reason,
            } => write!(f, "invalid {name} ({value}): {reason}"),
            ValidationError::UnknownAssetType(kind) => write!(f, "unknown asset type '{kind}'"),
            ValidationError::KindMismatch { expected, found } => {
                write!(f, "expected a {expected} flow, got a {found} flow")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors from fitting a growth curve to anchor points
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    InsufficientPoints { required: usize, found: usize },
    NonFinite,
    SingularSystem,
    DidNotConverge { iterations: usize, residual: f64 },
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitError::InsufficientPoints { required, found } => write!(
                f,
                "curve fit needs at least {required} distinct points, found {found}"
            ),
            FitError::NonFinite => write!(f, "anchor points contain non-finite values"),
            FitError::SingularSystem => write!(f, "least-squares system is singular"),
            FitError::DidNotConverge {
                iterations,
                residual,
            } => write!(
                f,
                "curve fit did not converge after {iterations} iterations (residual {residual:e})"
            ),
        }
    }
}

impl std::error::Error for FitError {}

/// Errors related to label lookups inside a portfolio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    IncomeStreamNotFound(String),
    AssetNotFound(String),
    ExpenseNotFound(String),
    LiabilityNotFound(String),
    PercentileNotFound(u8),
    /// Income growth was requested without reference data
    IncomeTableNotFound,
    ExpenditureBracketNotFound {
        region: String,
        income_group: String,
    },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::IncomeStreamNotFound(label) => {
                write!(f, "income stream '{label}' not found")
            }
            LookupError::AssetNotFound(label) => write!(f, "asset '{label}' not found"),
            LookupError::ExpenseNotFound(label) => write!(f, "expense '{label}' not found"),
            LookupError::LiabilityNotFound(label) => write!(f, "liability '{label}' not found"),
            LookupError::PercentileNotFound(p) => {
                write!(f, "no reference data for percentile {p}")
            }
            LookupError::IncomeTableNotFound => write!(f, "no income reference table loaded"),
            LookupError::ExpenditureBracketNotFound {
                region,
                income_group,
            } => write!(
                f,
                "no child expenditure data for region '{region}' and income group '{income_group}'"
            ),
        }
    }
}

impl std::error::Error for LookupError {}

/// Errors related to return distributions
#[derive(Debug, Clone, PartialEq)]
pub enum MarketError {
    InvalidDistributionParameters {
        profile_type: &'static str,
        mean: f64,
        std_dev: f64,
        reason: &'static str,
    },
    /// A holding's horizon reaches outside its ticker's simulated path
    HorizonNotCovered {
        ticker: String,
        start: Date,
        end: Date,
        path_start: Date,
        path_end: Date,
    },
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketError::InvalidDistributionParameters {
                profile_type,
                mean,
                std_dev,
                reason,
            } => write!(
                f,
                "invalid {profile_type} parameters (mean={mean}, std_dev={std_dev}): {reason}"
            ),
            MarketError::HorizonNotCovered {
                ticker,
                start,
                end,
                path_start,
                path_end,
            } => write!(
                f,
                "horizon {start}..{end} is outside the {ticker} path {path_start}..{path_end}"
            ),
        }
    }
}

impl std::error::Error for MarketError {}

#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationError),
    Fit(FitError),
    Lookup(LookupError),
    Market(MarketError),
    Date(jiff::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "{e}"),
            EngineError::Fit(e) => write!(f, "{e}"),
            EngineError::Lookup(e) => write!(f, "{e}"),
            EngineError::Market(e) => write!(f, "{e}"),
            EngineError::Date(e) => write!(f, "date calculation error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Validation(e) => Some(e),
            EngineError::Fit(e) => Some(e),
            EngineError::Lookup(e) => Some(e),
            EngineError::Market(e) => Some(e),
            EngineError::Date(e) => Some(e),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err)
    }
}

impl From<FitError> for EngineError {
    fn from(err: FitError) -> Self {
        EngineError::Fit(err)
    }
}

impl From<LookupError> for EngineError {
    fn from(err: LookupError) -> Self {
        EngineError::Lookup(err)
    }
}

impl From<MarketError> for EngineError {
    fn from(err: MarketError) -> Self {
        EngineError::Market(err)
    }
}

impl From<jiff::Error> for EngineError {
    fn from(err: jiff::Error) -> Self {
        EngineError::Date(err)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
