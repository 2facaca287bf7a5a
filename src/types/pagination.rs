use handle_errors::Error;
use std::collections::HashMap;

/// The window of questions requested through the query string.
#[derive(Default, Debug, PartialEq)]
pub struct Pagination {
    /// How many questions to return. `None` returns the rest of the table.
    pub limit: Option<u32>,
    /// How many questions to skip from the start.
    pub offset: u32,
}

/// Extract pagination parameters from the `/questions` route.
/// # Example query
/// GET requests to this route can carry a window of questions to return:
/// `/questions?limit=10&offset=20`
/// Both keys are optional; any other key is ignored.
/// # Example usage
/// ```rust,ignore
/// let mut query = HashMap::new();
/// query.insert("limit".to_string(), "1".to_string());
/// query.insert("offset".to_string(), "10".to_string());
/// let p = extract_pagination(query).unwrap();
/// assert_eq!(p.limit, Some(1));
/// assert_eq!(p.offset, 10);
/// ```
pub fn extract_pagination(params: HashMap<String, String>) -> Result<Pagination, Error> {
    let limit = match params.get("limit") {
        Some(limit) => Some(limit.parse::<u32>().map_err(Error::ParseError)?),
        None => None,
    };
    let offset = match params.get("offset") {
        Some(offset) => offset.parse::<u32>().map_err(Error::ParseError)?,
        None => 0,
    };

    Ok(Pagination { limit, offset })
}
