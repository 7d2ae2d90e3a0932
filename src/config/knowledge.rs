use serde::Serialize;

/// A titled list shown in the side panel next to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KnowledgeSection {
    pub title: &'static str,
    pub items: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeContent {
    pub sections: &'static [KnowledgeSection],
}

pub const COMMON_SYMPTOMS: [&str; 8] = [
    "Headache",
    "Fever",
    "Fatigue",
    "Nausea",
    "Dizziness",
    "Chest Pain",
    "Cough",
    "Shortness of breath",
];

pub const HEALTH_TIPS: [&str; 5] = [
    "Stay hydrated: Drink 8 glasses of water daily",
    "Get 7-9 hours of sleep each night",
    "Exercise at least 30 minutes daily",
    "Maintain a balanced diet with fruits and vegetables",
    "Practice mindfulness or meditation",
];

pub const SUGGESTED_TOPICS: [&str; 7] = [
    "Sleep Health",
    "Mental Wellness",
    "Diet & Nutrition",
    "Exercise Tips",
    "Stress Management",
    "Common Medications",
    "First Aid",
];

pub const SEASONAL_HEALTH: [&str; 4] = [
    "Allergy Prevention",
    "Sun Protection",
    "Hydration Tips",
    "Heat Stress Prevention",
];

pub const PERSONAL_RECOMMENDATIONS: [&str; 4] = [
    "Blood Pressure Management",
    "Regular Exercise Routine",
    "Sleep Improvement",
    "Stress Reduction",
];

pub const QUICK_RESOURCES: [&str; 4] = [
    "Find a Specialist",
    "Medication Reminder",
    "Emergency Contacts",
    "Health Tracker",
];

// Panel order.
const SECTIONS: [KnowledgeSection; 6] = [
    KnowledgeSection { title: "Common Symptoms", items: &COMMON_SYMPTOMS },
    KnowledgeSection { title: "Health Tips", items: &HEALTH_TIPS },
    KnowledgeSection { title: "Suggested Topics", items: &SUGGESTED_TOPICS },
    KnowledgeSection { title: "Seasonal Health", items: &SEASONAL_HEALTH },
    KnowledgeSection { title: "For You", items: &PERSONAL_RECOMMENDATIONS },
    KnowledgeSection { title: "Quick Resources", items: &QUICK_RESOURCES },
];

pub fn knowledge_content() -> KnowledgeContent {
    KnowledgeContent { sections: &SECTIONS }
}
