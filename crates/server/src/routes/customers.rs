//! Signed-in customer routes: profile image, cart removal and logout.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{delete, post},
};
use serde_json::{Value, json};
use tracing::instrument;

use nextgen_core::CartId;

use super::uploads::{UploadForm, UploadedFile};
use crate::db::{CustomerRepository, OrderRepository};
use crate::error::{AppError, Result, clear_sentry_user};
use crate::middleware::RequireCustomer;
use crate::models::customer::PROFILE_IMAGE_KEY;
use crate::services::storage::UploadFolder;
use crate::state::AppState;

/// Largest accepted profile image.
pub const MAX_PROFILE_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/store/customer/me/profile-upload", post(upload_profile_image))
        .route("/store/cart/remove/{id}", delete(remove_cart))
        .route("/store/auth/session/logout", delete(logout))
}

fn check_profile_image(file: &UploadedFile) -> Result<()> {
    if !file.content_type.starts_with("image/") {
        return Err(AppError::BadRequest(
            "Invalid file type. Only images are allowed.".to_string(),
        ));
    }
    if file.bytes.len() > MAX_PROFILE_IMAGE_BYTES {
        return Err(AppError::BadRequest("File size exceeds 5MB limit.".to_string()));
    }
    Ok(())
}

/// Upload an avatar and record its URL in the customer's metadata.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn upload_profile_image(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let file = UploadForm::read(multipart, "imageFile")
        .await?
        .file
        .ok_or_else(|| AppError::BadRequest("No file received".to_string()))?;
    check_profile_image(&file)?;

    let image_url = file.store(&state, UploadFolder::CustomerProfile).await?;
    CustomerRepository::new(state.pool())
        .merge_metadata(&customer_id, &json!({ PROFILE_IMAGE_KEY: image_url }))
        .await?;

    tracing::info!("Profile image updated");
    Ok(Json(json!({ "success": true, "imageUrl": image_url })))
}

#[instrument(skip_all, fields(customer_id = %customer_id, cart_id = %cart_id))]
async fn remove_cart(
    RequireCustomer(customer_id): RequireCustomer,
    State(state): State<AppState>,
    Path(cart_id): Path<CartId>,
) -> Result<Json<Value>> {
    let orders = OrderRepository::new(state.pool());
    let cart = orders
        .find_cart(&cart_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;

    if cart.customer_id.as_ref() != Some(&customer_id) {
        return Err(AppError::Forbidden(
            "Unauthorized: You do not have permission to delete this cart".to_string(),
        ));
    }

    orders.delete_cart(&cart_id).await?;
    tracing::info!("Cart deleted");
    Ok(Json(json!({ "message": "Cart deleted successfully" })))
}

/// Bearer tokens are stateless; the client discards its token.
#[instrument(skip_all, fields(customer_id = %customer_id))]
async fn logout(RequireCustomer(customer_id): RequireCustomer) -> Json<Value> {
    clear_sentry_user();
    Json(json!({
        "success": true,
        "message": "Session and Cookie cleared. If using JWT authentication, please clear the token from client storage.",
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn file(content_type: &str, len: usize) -> UploadedFile {
        UploadedFile {
            file_name: "me.png".to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0; len],
        }
    }

    #[test]
    fn test_accepts_small_images() {
        assert!(check_profile_image(&file("image/png", 1024)).is_ok());
        assert!(check_profile_image(&file("image/jpeg", MAX_PROFILE_IMAGE_BYTES)).is_ok());
    }

    #[test]
    fn test_rejects_non_images() {
        let err = check_profile_image(&file("application/pdf", 10)).unwrap_err();
        assert_eq!(
            err.client_message(),
            "Invalid file type. Only images are allowed."
        );
    }

    #[test]
    fn test_rejects_oversized_images() {
        let err = check_profile_image(&file("image/png", MAX_PROFILE_IMAGE_BYTES + 1)).unwrap_err();
        assert_eq!(err.client_message(), "File size exceeds 5MB limit.");
    }
}
