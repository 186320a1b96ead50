use std::sync::Arc;

use crate::models::Id;
use crate::repo::{DirectoryRepo, RepoError, RepoResult};

/// Decides whether a user may read or write threads scoped to a classroom.
///
/// A user is a member when they hold a student enrollment in the classroom or
/// are the faculty member who owns it. Both paths are plain reads.
#[derive(Clone)]
pub struct AccessGuard {
    directory: Arc<dyn DirectoryRepo>,
}

impl AccessGuard {
    pub fn new(directory: Arc<dyn DirectoryRepo>) -> Self {
        Self { directory }
    }

    pub async fn check_classroom_membership(&self, user_id: Id, classroom_id: Id) -> RepoResult<bool> {
        if self.directory.find_enrollment(user_id, classroom_id).await?.is_some() {
            return Ok(true);
        }
        // no faculty profile just means "not faculty"
        let Some(profile) = self.directory.find_faculty_profile(user_id).await? else {
            return Ok(false);
        };
        match self.directory.get_classroom(classroom_id).await {
            Ok(classroom) => Ok(classroom.faculty_id == profile.id),
            Err(RepoError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
