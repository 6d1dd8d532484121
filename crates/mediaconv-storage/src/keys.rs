//! Per-user key namespace.

/// `users/{user_id}/`
pub fn user_prefix(user_id: i64) -> String {
    format!("users/{}/", user_id)
}

/// `users/{user_id}/{client_key}`
pub fn user_object_key(user_id: i64, client_key: &str) -> String {
    format!("{}{}", user_prefix(user_id), client_key)
}

/// `users/{user_id}/results/job-{job_id}/{filename}`
pub fn job_output_key(user_id: i64, job_id: i64, filename: &str) -> String {
    format!("{}results/job-{}/{}", user_prefix(user_id), job_id, filename)
}

/// The client-visible key for a namespaced storage key, if it belongs to the user.
pub fn strip_user_prefix(user_id: i64, storage_key: &str) -> Option<&str> {
    storage_key.strip_prefix(&user_prefix(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_keys() {
        assert_eq!(user_object_key(7, "videos/a.mp4"), "users/7/videos/a.mp4");
        assert_eq!(
            job_output_key(7, 42, "thumb.jpg"),
            "users/7/results/job-42/thumb.jpg"
        );
    }

    #[test]
    fn test_strip_user_prefix() {
        assert_eq!(strip_user_prefix(7, "users/7/a/b.txt"), Some("a/b.txt"));
        assert_eq!(strip_user_prefix(7, "users/70/a.txt"), None);
    }
}
