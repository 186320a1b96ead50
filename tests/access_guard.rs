#![cfg(feature = "inmem-store")]

use std::sync::Arc;

use classroom_forum::{access::AccessGuard, models::Id, repo::inmem::InMemRepo};

#[tokio::test]
async fn enrolled_students_and_owning_faculty_are_members() {
    let repo = Arc::new(InMemRepo::new());
    let faculty = Id::new_v4();
    let student = Id::new_v4();
    let classroom = repo.add_classroom(faculty).await;
    repo.enroll(student, classroom.id).await;
    let guard = AccessGuard::new(repo.clone());

    assert!(guard.check_classroom_membership(student, classroom.id).await.unwrap());
    assert!(guard.check_classroom_membership(faculty, classroom.id).await.unwrap());
}

#[tokio::test]
async fn strangers_and_other_faculty_are_not() {
    let repo = Arc::new(InMemRepo::new());
    let owner = Id::new_v4();
    let classroom = repo.add_classroom(owner).await;
    // faculty of a different classroom
    let other_faculty = Id::new_v4();
    let other = repo.add_classroom(other_faculty).await;
    let student = Id::new_v4();
    repo.enroll(student, other.id).await;
    let guard = AccessGuard::new(repo.clone());

    assert!(!guard.check_classroom_membership(Id::new_v4(), classroom.id).await.unwrap());
    assert!(!guard.check_classroom_membership(other_faculty, classroom.id).await.unwrap());
    assert!(!guard.check_classroom_membership(student, classroom.id).await.unwrap());
}

#[tokio::test]
async fn unknown_classroom_is_not_an_error() {
    let repo = Arc::new(InMemRepo::new());
    let faculty = Id::new_v4();
    repo.add_classroom(faculty).await;
    let guard = AccessGuard::new(repo);

    assert!(!guard.check_classroom_membership(faculty, Id::new_v4()).await.unwrap());
}
