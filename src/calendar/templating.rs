use super::Event;
use minijinja::value::{StructObject, Value};

impl StructObject for Event {
    fn get_field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "id" => Value::from(self.id),
            "summary" => Value::from(self.summary.clone()),
            "description" => Value::from(self.description.clone().unwrap_or_default()),
            "candidate" => Value::from(
                self.candidate_name()
                    .unwrap_or_else(|| self.summary.clone()),
            ),
            "position" => Value::from(self.job_title().unwrap_or("N/A").to_string()),
            "interviewer" => Value::from(self.interviewer_name().unwrap_or("N/A").to_string()),
            "created_by" => Value::from(self.created_by_name().unwrap_or_else(|| "N/A".into())),
            "platform" => Value::from(
                self.meeting_platform
                    .clone()
                    .unwrap_or_else(|| "Google Meet".into()),
            ),
            // Empty string when absent so templates can use plain truthiness.
            "link" => Value::from(self.link.clone().unwrap_or_default()),
            "date" => Value::from(self.start.format("%d %b %Y").to_string()),
            "time" => {
                let start_time = self.start.format("%I:%M %p");
                let end_time = self.end.format("%I:%M %p");

                Value::from(format!("{start_time} - {end_time}"))
            }
            "documents" => Value::from_serialize(&self.document_list()),
            _ => return None,
        };

        Some(value)
    }
}
