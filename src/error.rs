use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derivative::Derivative;
use mongodb::bson::ser::Error as BsonError;
use mongodb::error::Error as DatabaseError;
use serde::{Serialize, Serializer};

use crate::campaign::{CampaignId, CampaignStatus, Feature};
use crate::creator::CreatorId;

#[derive(Debug, Serialize, Derivative)]
#[derivative(PartialEq)]
#[serde(untagged)]
pub enum Error {
    // 400
    #[serde(serialize_with = "display")]
    InvalidJson(#[derivative(PartialEq = "ignore")] JsonPayloadError),
    #[serde(serialize_with = "display")]
    InvalidPath(#[derivative(PartialEq = "ignore")] PathError),
    #[serde(serialize_with = "display")]
    InvalidQuery(#[derivative(PartialEq = "ignore")] QueryPayloadError),
    InvalidDestination {
        destination: String,
    },

    // 404
    PathNotFound,
    CampaignNotFound {
        campaign_id: CampaignId,
    },
    CreatorNotFoundInCampaign {
        campaign_id: CampaignId,
        creator_id: CreatorId,
    },

    // 409
    ConcurrentModificationDetected,
    InvalidTransition {
        campaign_id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    },
    FeatureLocked {
        campaign_id: CampaignId,
        feature: Feature,
        status: CampaignStatus,
    },
    MissingCampaignHome {
        campaign_id: CampaignId,
    },
    MissingGroupChannel {
        campaign_id: CampaignId,
    },

    // 502
    ExternalServiceFailed {
        service: &'static str,
        #[derivative(PartialEq = "ignore")]
        reason: String,
    },

    // 500
    ExistentialState(String),
    MissingConfig {
        key: &'static str,
    },
    #[serde(serialize_with = "display")]
    FailedDatabaseCall(#[derivative(PartialEq = "ignore")] DatabaseError),
    #[serde(serialize_with = "display")]
    FailedToSerializeToBson(#[derivative(PartialEq = "ignore")] BsonError),
    #[serde(serialize_with = "display")]
    IoError(#[derivative(PartialEq = "ignore")] IoError),
}

impl Error {
    pub fn external(service: &'static str, reason: impl Display) -> Error {
        Error::ExternalServiceFailed {
            service,
            reason: reason.to_string(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "E4001000",
            Error::InvalidPath(_) => "E4001001",
            Error::InvalidQuery(_) => "E4001003",
            Error::InvalidDestination { .. } => "E4001004",
            Error::PathNotFound => "E4041000",
            Error::CampaignNotFound { .. } => "E4041001",
            Error::CreatorNotFoundInCampaign { .. } => "E4041002",
            Error::ConcurrentModificationDetected => "E4091000",
            Error::InvalidTransition { .. } => "E4091001",
            Error::FeatureLocked { .. } => "E4091002",
            Error::MissingCampaignHome { .. } => "E4091003",
            Error::MissingGroupChannel { .. } => "E4091004",
            Error::ExternalServiceFailed { .. } => "E5021000",
            Error::ExistentialState(_) => "E5001000",
            Error::FailedDatabaseCall(_) => "E5001001",
            Error::FailedToSerializeToBson(_) => "E5001002",
            Error::IoError(_) => "E5001003",
            Error::MissingConfig { .. } => "E5001004",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "The given json could not be parsed",
            Error::InvalidPath(_) => "The given path could not be parsed",
            Error::InvalidQuery(_) => "The given query could not be parsed",
            Error::InvalidDestination { .. } => {
                "The given notification destination is not a valid email address or webhook url"
            }
            Error::PathNotFound => "The requested path was not found",
            Error::CampaignNotFound { .. } => "The requested campaign was not found",
            Error::CreatorNotFoundInCampaign { .. } => {
                "The requested creator was not found in the campaign"
            }
            Error::ConcurrentModificationDetected => {
                "The server detected a concurrent modification"
            }
            Error::InvalidTransition { .. } => {
                "The requested status is not the next status for the campaign"
            }
            Error::FeatureLocked { .. } => {
                "The requested feature is not available at the campaign's current status"
            }
            Error::MissingCampaignHome { .. } => {
                "The requested campaign has no chat category to provision channels in"
            }
            Error::MissingGroupChannel { .. } => "The requested campaign has no group channel",
            Error::ExternalServiceFailed { .. } => {
                "An error occurred when communicating with an external service"
            }
            Error::ExistentialState(_) => "The server detected an invalid state",
            Error::FailedDatabaseCall(_) => {
                "An error occurred when communicating with the database"
            }
            Error::FailedToSerializeToBson(_) => {
                "An error occurred when serializing an object to bson"
            }
            Error::IoError(_) => "An error occurred during an I/O operation",
            Error::MissingConfig { .. } => "A required configuration value is missing or malformed",
        }
    }

    /// Whether the error came from the data store rather than the request or
    /// an external collaborator.
    pub fn is_data_access(&self) -> bool {
        matches!(
            self,
            Error::FailedDatabaseCall(_)
                | Error::FailedToSerializeToBson(_)
                | Error::ConcurrentModificationDetected
        )
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::InvalidDestination { .. } => StatusCode::BAD_REQUEST,
            Error::PathNotFound => StatusCode::NOT_FOUND,
            Error::CampaignNotFound { .. } => StatusCode::NOT_FOUND,
            Error::CreatorNotFoundInCampaign { .. } => StatusCode::NOT_FOUND,
            Error::ConcurrentModificationDetected => StatusCode::CONFLICT,
            Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            Error::FeatureLocked { .. } => StatusCode::CONFLICT,
            Error::MissingCampaignHome { .. } => StatusCode::CONFLICT,
            Error::MissingGroupChannel { .. } => StatusCode::CONFLICT,
            Error::ExternalServiceFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::ExistentialState(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedDatabaseCall(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSerializeToBson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::MissingConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        #[derive(Serialize)]
        struct Dummy<'a> {
            error_code: &'static str,
            error_message: &'static str,
            error_meta: &'a Error,
        }

        HttpResponse::build(self.status_code()).json(&Dummy {
            error_code: self.error_code(),
            error_message: self.error_message(),
            error_meta: self,
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Error {
        Error::FailedDatabaseCall(error)
    }
}

impl From<BsonError> for Error {
    fn from(error: BsonError) -> Error {
        Error::FailedToSerializeToBson(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(err) => Some(err),
            Error::InvalidPath(err) => Some(err),
            Error::InvalidQuery(err) => Some(err),
            Error::FailedDatabaseCall(err) => Some(err),
            Error::FailedToSerializeToBson(err) => Some(err),
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
