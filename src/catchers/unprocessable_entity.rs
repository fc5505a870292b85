use rocket::response::status::BadRequest;
use rocket::serde::json::{json, Value};
use rocket::Request;

/// Malformed JSON bodies surface as 400, like every other invalid payload.
#[catch(422)]
pub fn unprocessable_entity_to_bad_request(_req: &Request) -> BadRequest<Value> {
    BadRequest(json!({ "error": "The request body could not be parsed." }))
}
