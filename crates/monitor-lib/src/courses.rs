//! Course directory access
//!
//! Courses are declared on disk under `<root>/courses/<name>/` and student
//! work areas under `<root>/students/<student>/<course>/`. Every accessor
//! tolerates missing files so a half-provisioned course never stalls a
//! monitoring cycle.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait CourseDirectory: Send + Sync {
    /// Names of all declared courses
    fn list_courses(&self) -> Vec<String>;

    /// Image reference the course's containers are expected to run
    fn expected_image(&self, course: &str) -> Option<String>;

    /// Accounts that never count towards usage statistics
    fn staff(&self, course: &str) -> HashSet<String>;

    /// Number of students with a work area for the course
    fn student_homes(&self, course: &str) -> usize;
}

pub struct FsCourseDirectory {
    root: PathBuf,
}

impl FsCourseDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn course_dir(&self, course: &str) -> PathBuf {
        self.root.join("courses").join(course)
    }
}

impl CourseDirectory for FsCourseDirectory {
    fn list_courses(&self) -> Vec<String> {
        let courses_dir = self.root.join("courses");
        let entries = match fs::read_dir(&courses_dir) {
            Ok(entries) => entries,
            Err(error) => {
                debug!(path = %courses_dir.display(), %error, "No courses directory");
                return Vec::new();
            }
        };
        let mut courses: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        courses.sort();
        courses
    }

    fn expected_image(&self, course: &str) -> Option<String> {
        let image_path = self.course_dir(course).join("image");
        let reference = read_trimmed(&image_path)?;
        if reference.is_empty() {
            None
        } else {
            Some(reference)
        }
    }

    fn staff(&self, course: &str) -> HashSet<String> {
        let staff_path = self.course_dir(course).join("staff");
        match read_trimmed(&staff_path) {
            Some(contents) => contents
                .split_whitespace()
                .map(|name| name.to_string())
                .collect(),
            None => HashSet::new(),
        }
    }

    fn student_homes(&self, course: &str) -> usize {
        let students_dir = self.root.join("students");
        let entries = match fs::read_dir(&students_dir) {
            Ok(entries) => entries,
            Err(error) => {
                debug!(path = %students_dir.display(), %error, "No students directory");
                return 0;
            }
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(course).is_dir())
            .count()
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => Some(contents.trim().to_string()),
        Err(error) => {
            debug!(path = %path.display(), %error, "Unreadable course file");
            None
        }
    }
}
