// Public entities for the SchoolHealth API
// Request and response shapes that exist only at the HTTP boundary; the
// domain entities are serialized directly everywhere else.

// Common entities for errors, query strings and simple replies
pub mod common;

// Multipart form layouts, used for the OpenAPI document
pub mod forms;
