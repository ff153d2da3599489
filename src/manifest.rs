//! Instrumentation identity resolution from a packaged manifest.
//!
//! Decoding the manifest bytes is the job of a [`ManifestEvents`] source: a
//! pull interface over tag/attribute events. [`InstrumentationInfo::resolve`]
//! scans those events and extracts the three identifiers a run needs:
//!
//! | Tag | Attribute | Field |
//! |-----|-----------|-------|
//! | `manifest` | `package` | test (instrumentation) package |
//! | `instrumentation` | `targetPackage` | application package |
//! | `instrumentation` | `name` | test runner class |
//!
//! Relative runner names are qualified with the test package:
//!
//! ```
//! use testshard::manifest::qualify_runner_class;
//!
//! assert_eq!(qualify_runner_class("com.example.test", ".Runner"), "com.example.test.Runner");
//! assert_eq!(qualify_runner_class("com.example.test", "Runner"), "com.example.test.Runner");
//! assert_eq!(qualify_runner_class("com.example.test", "org.Runner"), "org.Runner");
//! ```

pub mod xml;

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

pub use xml::XmlManifest;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors that can occur while reading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// A required field was not present anywhere in the manifest.
    #[error("Could not find {0} in manifest")]
    MissingField(ManifestField),

    /// The manifest could not be opened or read.
    #[error("Unable to read manifest {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest bytes could not be decoded into events.
    #[error("Unable to decode manifest: {0}")]
    Decode(String),
}

/// The identifiers resolved from a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestField {
    /// `instrumentation/@targetPackage`
    ApplicationPackage,
    /// `manifest/@package`
    TestPackage,
    /// `instrumentation/@name`
    TestRunnerClass,
}

impl std::fmt::Display for ManifestField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestField::ApplicationPackage => f.write_str("application package"),
            ManifestField::TestPackage => f.write_str("test application package"),
            ManifestField::TestRunnerClass => f.write_str("test runner class"),
        }
    }
}

/// A single attribute on a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name without any namespace prefix.
    pub name: String,
    /// Attribute value rendered as a string.
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One event pulled from a manifest document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEvent {
    /// An element opened.
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
    },
    /// An element closed.
    EndTag { name: String },
    /// Text, namespace or other events the resolver has no use for.
    Other,
    /// No more events.
    EndDocument,
}

/// Pull interface over manifest events.
///
/// After [`ManifestEvent::EndDocument`] has been returned, further calls keep
/// returning it.
pub trait ManifestEvents {
    /// Returns the next event.
    fn next_event(&mut self) -> ManifestResult<ManifestEvent>;
}

impl ManifestEvents for std::vec::IntoIter<ManifestEvent> {
    fn next_event(&mut self) -> ManifestResult<ManifestEvent> {
        Ok(self.next().unwrap_or(ManifestEvent::EndDocument))
    }
}

impl<T: ManifestEvents + ?Sized> ManifestEvents for &mut T {
    fn next_event(&mut self) -> ManifestResult<ManifestEvent> {
        (**self).next_event()
    }
}

/// The instrumentation identity of a test package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentationInfo {
    /// Package of the application under test.
    pub application_package: String,
    /// Package of the instrumentation (test) application.
    pub instrumentation_package: String,
    /// Fully-qualified test runner class.
    pub test_runner_class: String,
}

impl InstrumentationInfo {
    /// Scans `events` to the end of the document and resolves the
    /// instrumentation identity.
    ///
    /// When a tag or attribute occurs more than once, the last value wins.
    /// The runner class is qualified with [`qualify_runner_class`].
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingField`] if any of the three fields is
    /// absent once the document ends, or any error raised by the event source.
    /// No partially resolved value is ever returned.
    pub fn resolve<E: ManifestEvents>(mut events: E) -> ManifestResult<Self> {
        let mut app_package = None;
        let mut test_package = None;
        let mut runner_class = None;

        loop {
            let (name, attributes) = match events.next_event()? {
                ManifestEvent::EndDocument => break,
                ManifestEvent::StartTag { name, attributes } => (name, attributes),
                _ => continue,
            };

            match name.as_str() {
                "manifest" => {
                    for attr in attributes {
                        if attr.name == "package" {
                            test_package = Some(attr.value);
                        }
                    }
                }
                "instrumentation" => {
                    for attr in attributes {
                        match attr.name.as_str() {
                            "targetPackage" => app_package = Some(attr.value),
                            "name" => runner_class = Some(attr.value),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        // An empty attribute value counts as absent.
        let instrumentation_package = test_package
            .filter(|v| !v.is_empty())
            .ok_or(ManifestError::MissingField(ManifestField::TestPackage))?;
        let application_package = app_package
            .filter(|v| !v.is_empty())
            .ok_or(ManifestError::MissingField(ManifestField::ApplicationPackage))?;
        let runner_class = runner_class
            .filter(|v| !v.is_empty())
            .ok_or(ManifestError::MissingField(ManifestField::TestRunnerClass))?;

        let test_runner_class = qualify_runner_class(&instrumentation_package, &runner_class);
        debug!(
            "Resolved instrumentation {} -> {} ({})",
            instrumentation_package, application_package, test_runner_class
        );

        Ok(Self {
            application_package,
            instrumentation_package,
            test_runner_class,
        })
    }

    /// Checks that every identifier is non-empty.
    ///
    /// Values built by [`resolve`](Self::resolve) always pass; this guards
    /// values assembled by hand.
    pub fn validate(&self) -> ManifestResult<()> {
        let fields = [
            (&self.instrumentation_package, ManifestField::TestPackage),
            (&self.application_package, ManifestField::ApplicationPackage),
            (&self.test_runner_class, ManifestField::TestRunnerClass),
        ];
        match fields.into_iter().find(|(value, _)| value.is_empty()) {
            Some((_, field)) => Err(ManifestError::MissingField(field)),
            None => Ok(()),
        }
    }

    /// Reads and resolves a decoded manifest document from disk.
    pub fn from_file(path: impl Into<PathBuf>) -> ManifestResult<Self> {
        Self::resolve(XmlManifest::open(path)?)
    }
}

/// Qualifies a possibly relative runner class name with `package`.
///
/// `.Runner` becomes `package.Runner`, a bare `Runner` becomes
/// `package.Runner` and anything already containing a `.` is left alone.
pub fn qualify_runner_class(package: &str, runner: &str) -> String {
    if runner.starts_with('.') {
        format!("{}{}", package, runner)
    } else if !runner.contains('.') {
        format!("{}.{}", package, runner)
    } else {
        runner.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str, attrs: &[(&str, &str)]) -> ManifestEvent {
        ManifestEvent::StartTag {
            name: name.to_string(),
            attributes: attrs.iter().map(|(k, v)| Attribute::new(*k, *v)).collect(),
        }
    }

    fn end(name: &str) -> ManifestEvent {
        ManifestEvent::EndTag {
            name: name.to_string(),
        }
    }

    fn typical(runner: &str) -> Vec<ManifestEvent> {
        vec![
            start("manifest", &[("versionCode", "1"), ("package", "com.example.test")]),
            start("uses-sdk", &[("minSdkVersion", "21")]),
            end("uses-sdk"),
            start(
                "instrumentation",
                &[("name", runner), ("targetPackage", "com.example")],
            ),
            end("instrumentation"),
            end("manifest"),
            ManifestEvent::EndDocument,
        ]
    }

    #[test]
    fn test_resolve_fully_qualified_runner() {
        let info =
            InstrumentationInfo::resolve(typical("androidx.test.runner.AndroidJUnitRunner").into_iter())
                .unwrap();
        assert_eq!(info.application_package, "com.example");
        assert_eq!(info.instrumentation_package, "com.example.test");
        assert_eq!(info.test_runner_class, "androidx.test.runner.AndroidJUnitRunner");
    }

    #[test]
    fn test_resolve_relative_runner() {
        let info = InstrumentationInfo::resolve(typical(".MyRunner").into_iter()).unwrap();
        assert_eq!(info.test_runner_class, "com.example.test.MyRunner");

        let info = InstrumentationInfo::resolve(typical("MyRunner").into_iter()).unwrap();
        assert_eq!(info.test_runner_class, "com.example.test.MyRunner");

        let info = InstrumentationInfo::resolve(typical("com.other.MyRunner").into_iter()).unwrap();
        assert_eq!(info.test_runner_class, "com.other.MyRunner");
    }

    #[test]
    fn test_last_value_wins() {
        let events = vec![
            start("manifest", &[("package", "com.first")]),
            start("instrumentation", &[("name", "A"), ("targetPackage", "app.one")]),
            start("instrumentation", &[("name", "B"), ("targetPackage", "app.two")]),
            start("manifest", &[("package", "com.second")]),
        ];
        let info = InstrumentationInfo::resolve(events.into_iter()).unwrap();
        assert_eq!(info.instrumentation_package, "com.second");
        assert_eq!(info.application_package, "app.two");
        assert_eq!(info.test_runner_class, "com.second.B");
    }

    #[test]
    fn test_attributes_on_other_tags_are_ignored() {
        let events = vec![
            start("application", &[("package", "wrong"), ("name", "Wrong")]),
            start("manifest", &[("targetPackage", "wrong")]),
        ];
        let err = InstrumentationInfo::resolve(events.into_iter()).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::MissingField(ManifestField::TestPackage)
        ));
    }

    #[test]
    fn test_missing_fields_are_named() {
        let events = vec![start("manifest", &[("package", "com.example.test")])];
        let err = InstrumentationInfo::resolve(events.into_iter()).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::MissingField(ManifestField::ApplicationPackage)
        ));
        assert_eq!(
            err.to_string(),
            "Could not find application package in manifest"
        );

        let events = vec![
            start("manifest", &[("package", "com.example.test")]),
            start("instrumentation", &[("targetPackage", "com.example")]),
        ];
        let err = InstrumentationInfo::resolve(events.into_iter()).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::MissingField(ManifestField::TestRunnerClass)
        ));
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let cases = [
            ("", "com.example", "Runner", ManifestField::TestPackage),
            ("com.example.test", "", "Runner", ManifestField::ApplicationPackage),
            ("com.example.test", "com.example", "", ManifestField::TestRunnerClass),
        ];
        for (package, target, runner, missing) in cases {
            let events = vec![
                start("manifest", &[("package", package)]),
                start("instrumentation", &[("name", runner), ("targetPackage", target)]),
            ];
            let err = InstrumentationInfo::resolve(events.into_iter()).unwrap_err();
            match err {
                ManifestError::MissingField(field) => assert_eq!(field, missing),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_empty_value_does_not_override_earlier_value() {
        let events = vec![
            start("manifest", &[("package", "com.example.test")]),
            start("instrumentation", &[("name", "Runner"), ("targetPackage", "")]),
        ];
        let err = InstrumentationInfo::resolve(events.into_iter()).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::MissingField(ManifestField::ApplicationPackage)
        ));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let info = InstrumentationInfo {
            application_package: "com.example".to_string(),
            instrumentation_package: "com.example.test".to_string(),
            test_runner_class: String::new(),
        };
        assert!(matches!(
            info.validate(),
            Err(ManifestError::MissingField(ManifestField::TestRunnerClass))
        ));
    }

    #[test]
    fn test_source_errors_propagate() {
        struct Broken;
        impl ManifestEvents for Broken {
            fn next_event(&mut self) -> ManifestResult<ManifestEvent> {
                Err(ManifestError::Decode("truncated chunk".to_string()))
            }
        }

        let err = InstrumentationInfo::resolve(Broken).unwrap_err();
        assert!(matches!(err, ManifestError::Decode(_)));
    }
}
