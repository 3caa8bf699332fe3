// Forecast push-channel events
pub mod dispatcher;
pub mod payload;

pub use dispatcher::EventDispatcher;
pub use payload::{
    CompletePayload, DecodeError, ErrorPayload, ForecastEvent, ModelLoadedPayload, Normalization,
    PredictionDetail, RawEvent, ValidationDetail, ValidationMetrics, ValidationPayload,
};
