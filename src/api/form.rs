// Multipart form parsing for the upload endpoints

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::str::FromStr;

use crate::core::errors::{ApiError, ApiResult};
use crate::core::types::{FaceSwapRequest, GenerationParams, GenerationRequest, UploadedImage};

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!("Upload too large: {}", e.body_text()))
    } else {
        ApiError::BadRequest(format!("Multipart error: {}", e.body_text()))
    }
}

async fn read_upload(field: Field<'_>) -> ApiResult<UploadedImage> {
    let filename = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;

    Ok(UploadedImage {
        filename,
        content_type,
        bytes,
    })
}

async fn read_text(field: Field<'_>) -> ApiResult<String> {
    field.text().await.map_err(multipart_error)
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> ApiResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid value for {}: {:?}", name, raw)))
}

fn required<T>(value: Option<T>, name: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::BadRequest(format!("Missing required field: {}", name)))
}

/// Parse the `/generate` form. Unknown fields are ignored.
pub async fn read_generate_form(mut multipart: Multipart) -> ApiResult<GenerationRequest> {
    let mut face_image = None;
    let mut mask_image = None;
    let mut prompt = None;
    let mut params = GenerationParams::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "face_image" => face_image = Some(read_upload(field).await?),
            "mask_image" => mask_image = Some(read_upload(field).await?),
            "prompt" => prompt = Some(read_text(field).await?),
            "negative_prompt" => params.negative_prompt = read_text(field).await?,
            "num_images" => params.num_images = parse_number(&name, &read_text(field).await?)?,
            "guidance_scale" => {
                params.guidance_scale = parse_number(&name, &read_text(field).await?)?
            }
            "num_inference_steps" => {
                params.num_inference_steps = parse_number(&name, &read_text(field).await?)?
            }
            "width" => params.width = parse_number(&name, &read_text(field).await?)?,
            "height" => params.height = parse_number(&name, &read_text(field).await?)?,
            _ => {}
        }
    }

    params.prompt = required(prompt, "prompt")?;

    Ok(GenerationRequest {
        face_image: required(face_image, "face_image")?,
        mask_image,
        params,
    })
}

/// Parse the `/face-swap` form
pub async fn read_face_swap_form(mut multipart: Multipart) -> ApiResult<FaceSwapRequest> {
    let mut face_image = None;
    let mut target_image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "face_image" => face_image = Some(read_upload(field).await?),
            "target_image" => target_image = Some(read_upload(field).await?),
            _ => {}
        }
    }

    Ok(FaceSwapRequest {
        face_image: required(face_image, "face_image")?,
        target_image: required(target_image, "target_image")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<u32>("width", " 512 ").unwrap(), 512);
        assert!((parse_number::<f32>("guidance_scale", "7.5").unwrap() - 7.5).abs() < f32::EPSILON);
        let err = parse_number::<u32>("num_images", "four").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref msg) if msg.contains("num_images")));
    }

    #[test]
    fn test_required() {
        assert_eq!(required(Some(1), "x").unwrap(), 1);
        let err = required::<u8>(None, "prompt").unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: prompt");
    }
}
