use byte_unit::Byte;
use std::str::FromStr;

const CHUNK_SIZE_UNDER_MIN: &str = "must be greater than or equal to 5MiB";
const CHUNK_SIZE_OVER_MAX: &str = "must be smaller than or equal to 5GiB";
const FILE_SIZE_LIMIT_ZERO: &str = "must be greater than 0";
const FILE_SIZE_LIMIT_OVER_MAX: &str = "must be smaller than or equal to 16EiB";

// Every part except the last one must satisfy the multipart minimum of the object store.
const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;
const MAX_CHUNK_SIZE: u64 = 5 * 1024 * 1024 * 1024;

fn to_bytes(value: &str) -> Result<u64, String> {
    let bytes = Byte::from_str(value).map_err(|e| e.to_string())?;
    u64::try_from(bytes.as_u128()).map_err(|_| FILE_SIZE_LIMIT_OVER_MAX.to_string())
}

pub fn check_chunk_size(value: &str) -> Result<String, String> {
    parse_chunk_size(value)?;
    Ok(value.to_string())
}

pub fn parse_chunk_size(value: &str) -> Result<u64, String> {
    let chunk_size = Byte::from_str(value).map_err(|e| e.to_string())?.as_u128();

    if chunk_size < (MIN_CHUNK_SIZE as u128) {
        return Err(CHUNK_SIZE_UNDER_MIN.to_string());
    }
    if (MAX_CHUNK_SIZE as u128) < chunk_size {
        return Err(CHUNK_SIZE_OVER_MAX.to_string());
    }

    Ok(chunk_size as u64)
}

pub fn check_file_size_limit(value: &str) -> Result<String, String> {
    parse_file_size_limit(value)?;
    Ok(value.to_string())
}

pub fn parse_file_size_limit(value: &str) -> Result<u64, String> {
    let limit = to_bytes(value)?;
    if limit == 0 {
        return Err(FILE_SIZE_LIMIT_ZERO.to_string());
    }

    Ok(limit)
}
