use super::types::IastError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    /// Expected errors are caused by the caller's input and are answered with
    /// the invalid-data response. Everything else fails the request only.
    pub expected: bool,
}

impl IastError {
    /// Classify this error to decide how the ingestion endpoint reports it.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Rejected input
            IastError::ContentTypeInvalid(_) => ErrorClassification {
                error_type: "ContentTypeInvalid",
                expected: true,
            },
            IastError::ResultJson(_) => ErrorClassification {
                error_type: "ResultJsonError",
                expected: true,
            },
            IastError::ResultInvalid(_) => ErrorClassification {
                error_type: "ResultInvalid",
                expected: true,
            },
            IastError::ResultHost(_) => ErrorClassification {
                error_type: "ResultHostError",
                expected: true,
            },

            // Fatal for the current request
            IastError::Database(_) => ErrorClassification {
                error_type: "DatabaseError",
                expected: false,
            },
            IastError::QueueNotExist(_) => ErrorClassification {
                error_type: "QueueNotExist",
                expected: false,
            },
            IastError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                expected: false,
            },
            IastError::Bind(_) => ErrorClassification {
                error_type: "BindError",
                expected: false,
            },
            IastError::Plugin(_) => ErrorClassification {
                error_type: "PluginError",
                expected: false,
            },
            IastError::Io(_) => ErrorClassification {
                error_type: "IoError",
                expected: false,
            },
            IastError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                expected: false,
            },
            IastError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                expected: false,
            },
            IastError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                expected: false,
            },
        }
    }

    pub fn is_expected(&self) -> bool {
        self.classify().expected
    }
}
