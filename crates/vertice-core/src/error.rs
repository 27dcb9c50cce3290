use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerticeError {
    #[error("invalid image for box {box_name}: {image}")]
    InvalidImage { box_name: String, image: String },

    #[error("no machines found for box {0}")]
    EmptyBoxSet(String),

    #[error("provisioner \"{0}\" not registered")]
    ProvisionerNotRegistered(String),

    #[error("router \"{0}\" not found")]
    RouterNotFound(String),

    #[error("pipeline must contain at least one action")]
    EmptyPipeline,

    /// A pipeline step failed. `source` is the error returned by the step's
    /// forward function, untouched by any compensation that ran afterwards.
    #[error("action {action} failed: {source}")]
    Action {
        action: String,
        #[source]
        source: Box<VerticeError>,
    },

    #[error("iaas call for box {box_name} failed: {source}")]
    Iaas {
        box_name: String,
        #[source]
        source: Box<VerticeError>,
    },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("router error: {0}")]
    Router(String),

    #[error("metadata store error: {0}")]
    Store(String),

    #[error("repository hook error: {0}")]
    Repository(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl VerticeError {
    /// Name of the pipeline action that produced this error, if any.
    pub fn failed_action(&self) -> Option<&str> {
        match self {
            VerticeError::Action { action, .. } => Some(action),
            _ => None,
        }
    }

    /// The forward error a pipeline step returned, if this is a step failure.
    pub fn step_source(&self) -> Option<&VerticeError> {
        match self {
            VerticeError::Action { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Attach box context to an error coming back from an IaaS client.
    pub(crate) fn in_box(box_name: &str) -> impl FnOnce(VerticeError) -> VerticeError + '_ {
        move |e| VerticeError::Iaas {
            box_name: box_name.to_string(),
            source: Box::new(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, VerticeError>;
