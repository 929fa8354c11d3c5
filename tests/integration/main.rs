//! Host-side integration tests for the full protocol chain:
//! envelope decode → command routing → mode machine → event publish.

mod service_tests;
