//! crates/festival_stories_core/src/sample_data.rs
//!
//! Demo storytellers and festival stories for a fresh deployment. The demo
//! accounts carry unsalted SHA-256 digests of "password", the format early
//! deployments used, so they also exercise legacy hash verification.

use crate::domain::{InputMethod, NewStory, Section, User};
use crate::ports::{PortResult, RecordStore};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};

/// SHA-256 of "password".
const DEMO_PASSWORD_DIGEST: &str =
    "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";

/// email, name, preferred language, state, joined at
const DEMO_USERS: [(&str, &str, &str, &str, &str); 4] = [
    ("priya.sharma@email.com", "Priya Sharma", "Hindi", "Rajasthan", "2024-01-15T10:30:00"),
    ("rajesh.kumar@email.com", "Rajesh Kumar", "Bengali", "West Bengal", "2024-01-20T14:15:00"),
    ("anita.patel@email.com", "Anita Patel", "Gujarati", "Gujarat", "2024-02-01T09:45:00"),
    ("meera.reddy@email.com", "Meera Reddy", "Telugu", "Andhra Pradesh", "2024-02-05T16:20:00"),
];

struct DemoStory {
    owner: &'static str,
    title: &'static str,
    festival: &'static str,
    language: &'static str,
    story_type: &'static str,
    description: &'static str,
    improvements: [&'static str; 3],
    /// title, content, image description
    sections: &'static [(&'static str, &'static str, &'static str)],
}

const DEMO_STORIES: [DemoStory; 4] = [
    DemoStory {
        owner: "priya.sharma@email.com",
        title: "Diwali ki Roshni - The Light of Hope",
        festival: "Diwali",
        language: "Hindi",
        story_type: "Family Tradition",
        description: "A heartwarming story about how Diwali brought light to our family during difficult times.",
        improvements: ["Enhanced emotional depth", "Improved narrative flow", "Added cultural context"],
        sections: &[
            (
                "The Dark Before the Light",
                "It was 2019, and our family had faced many challenges. My father had lost his job, and we were struggling financially. As Diwali approached, we wondered if we could celebrate at all. The house felt darker than usual, and hope seemed distant.",
                "A dimly lit traditional Indian home with worried family members sitting together, shadows cast by a single oil lamp",
            ),
            (
                "Community's Embrace",
                "On the morning of Diwali, our neighbors began arriving with sweets, rangoli colors, and warm smiles. Mrs. Gupta brought homemade ladoos, while the Agarwal family gifted us beautiful diyas. The entire community came together, reminding us that festivals are about togetherness, not just expenses.",
                "Neighbors of different ages gathering in a courtyard, sharing sweets and colorful rangoli patterns, children playing with sparklers",
            ),
            (
                "The Light Returns",
                "As evening fell, our home was transformed. Hundreds of diyas flickered in the darkness, and our hearts were full once again. That Diwali taught us that the real light of the festival comes from love, community, and hope. Today, whenever someone in our neighborhood faces difficulties, we remember that Diwali lesson and reach out with open hearts.",
                "A beautifully illuminated Indian home with rows of oil lamps, family members in traditional attire celebrating together, fireworks in the distant sky",
            ),
        ],
    },
    DemoStory {
        owner: "rajesh.kumar@email.com",
        title: "Durga Puja: Mayer Ashirbad",
        festival: "Durga Puja",
        language: "Bengali",
        story_type: "Community Celebration",
        description: "The magical five days of Durga Puja in our Kolkata neighborhood, where tradition meets modernity.",
        improvements: ["Enhanced Bengali cultural references", "Improved chronological structure", "Added sensory details"],
        sections: &[
            (
                "Shashthi: The Awakening",
                "The dhak beats echo through the narrow lanes of our para as Maa Durga arrives. The pandal, crafted by local artisans over months, reveals itself in all its glory. Children in new clothes run around excitedly while elders perform the ritual awakening of the goddess. The air is thick with incense and anticipation.",
                "A magnificent Bengali Durga pandal with intricate decorations, crowds of devotees in traditional attire, dhakis playing drums",
            ),
            (
                "Saptami to Ashtami: Divine Celebrations",
                "The next two days blur into a beautiful chaos of prayers, cultural programs, and endless adda. The para comes alive with young artists performing classical dances, poets reciting verses, and musicians filling the night with soulful melodies. Food stalls offer everything from puchka to traditional sweets.",
                "Cultural programs on a decorated stage, young dancers in colorful costumes, families enjoying street food under festive lights",
            ),
            (
                "Navami: The Grand Celebration",
                "On Navami, the celebration reaches its peak. The entire community participates in the evening aarti, thousands of voices joining in harmony. The sindoor khela brings women together in joyful abandon, their white sarees transformed with vermillion, symbolizing the goddess's blessings.",
                "Women in white sarees playing with sindoor, covering each other with vermillion, laughing and celebrating together",
            ),
            (
                "Dashami: The Tearful Farewell",
                "As Dashami arrives, tears mix with celebration. Maa Durga's immersion in the Ganges is both an ending and a promise of return. The entire para accompanies her to the river, dancing and chanting 'Dugga Mai ki Jay!' The goddess leaves, but her blessings and the memories of these five magical days remain in our hearts until next year.",
                "A procession carrying Durga idol towards the river, devotees dancing and chanting, Ganga ghat with floating flowers and lamps",
            ),
        ],
    },
    DemoStory {
        owner: "anita.patel@email.com",
        title: "Navratri: Nine Nights of Divine Dance",
        festival: "Navratri",
        language: "Gujarati",
        story_type: "Personal Experience",
        description: "My first Navratri in Gujarat, where I discovered the true meaning of devotion through dance.",
        improvements: ["Added authentic Gujarati phrases", "Enhanced cultural immersion narrative", "Improved emotional progression"],
        sections: &[
            (
                "The Rhythmic Welcome",
                "As a newcomer to Ahmedabad, I was nervous about participating in Navratri. But when I heard the dhol-tasha and saw hundreds of people moving in perfect harmony to the garba steps, my feet began to move on their own. An elderly aunty grabbed my hand, smiled, and whispered, 'Aaje to aapo ne raas ramva na din che!' (Today is the day to play and celebrate!)",
                "A vibrant Navratri celebration with people in colorful traditional Gujarati attire dancing garba in concentric circles",
            ),
            (
                "Learning the Sacred Steps",
                "Each night, I learned new steps and met new friends. The garba taught me patience, the dandiya taught me coordination, and the community taught me belonging. Young children would giggle as they corrected my steps, while elders shared stories of Navratris from their youth. By the fifth night, I was no longer a spectator but a participant in this divine dance.",
                "People of all ages teaching and learning garba steps, children laughing, colorful dandiya sticks creating patterns in the air",
            ),
            (
                "Nine Nights, One Soul",
                "On the final night, as I danced the aarti, I understood why Navratri is called a celebration of the divine feminine. It wasn't just about the steps or the music; it was about the collective energy, the shared devotion, and the community that embraces everyone as family. Those nine nights transformed me from an outsider to a daughter of Gujarat.",
                "The grand finale of Navratri with elaborate decorations, hundreds of dancers in perfect formation, Garba queen being crowned",
            ),
        ],
    },
    DemoStory {
        owner: "meera.reddy@email.com",
        title: "Ganesh Chaturthi: Bappa's Homecoming",
        festival: "Ganesh Chaturthi",
        language: "Telugu",
        story_type: "Childhood Memory",
        description: "Childhood memories of Ganesh Chaturthi in our Hyderabad colony, where Bappa brought the community together.",
        improvements: ["Enhanced childhood perspective", "Added Telugu cultural elements", "Improved emotional storytelling"],
        sections: &[
            (
                "Bappa's Grand Arrival",
                "The whole colony would wait for weeks as uncles and aunties planned the grandest welcome for Ganesha. The pandal would be decorated with fresh marigolds and jasmine, and the most beautiful Ganesha idol would be installed with great pomp. As children, we would compete to be the first to seek Bappa's blessings and receive the coveted modak prasadam.",
                "A beautifully decorated Ganesha pandal with a magnificent idol, children and adults offering prayers, fresh flower garlands",
            ),
            (
                "Ten Days of Joy",
                "For ten magical days, our colony transformed into a cultural hub. Every evening brought new performances - classical dances, devotional songs, and skits about Ganesha's stories. The ladies would organize cooking competitions, making different varieties of modaks and undrallu. We children would participate in rangoli competitions and quiz contests about Lord Ganesha.",
                "Community cultural programs with children performing dances, women displaying various traditional sweets, colorful rangoli patterns",
            ),
            (
                "The Tearful Farewell",
                "On Anant Chaturdashi, the entire colony would accompany Bappa to the Hussain Sagar lake for visarjan. The procession would be filled with drums, dancing, and chants of 'Ganpati Bappa Morya!' As we watched our beloved Ganesha disappear into the waters, we would cry and promise to bring him back next year with even more love and devotion.",
                "A grand procession towards a lake, people carrying Ganesha idol, devotees dancing and celebrating, lake with floating flowers",
            ),
        ],
    },
];

/// What a seeding run added. Records that already existed are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users_added: usize,
    pub stories_added: usize,
}

fn demo_user(entry: &(&str, &str, &str, &str, &str)) -> User {
    let (email, name, language, state, joined) = *entry;
    User {
        email: email.to_string(),
        name: name.to_string(),
        password_hash: DEMO_PASSWORD_DIGEST.to_string(),
        preferred_language: language.to_string(),
        state: state.to_string(),
        created_at: joined.parse::<NaiveDateTime>().ok(),
        stories: Vec::new(),
    }
}

impl DemoStory {
    fn to_new_story(&self) -> NewStory {
        let improvements: Vec<String> = self.improvements.iter().map(|s| s.to_string()).collect();
        NewStory {
            title: self.title.to_string(),
            festival: self.festival.to_string(),
            language: self.language.to_string(),
            story_type: self.story_type.to_string(),
            description: self.description.to_string(),
            input_method: InputMethod::Text,
            sections: self
                .sections
                .iter()
                .map(|(title, content, image_description)| Section {
                    title: title.to_string(),
                    content: content.to_string(),
                    image_description: image_description.to_string(),
                    ai_improvements: improvements.clone(),
                    ..Default::default()
                })
                .collect(),
            images: Default::default(),
            ai_enhanced: true,
        }
    }
}

/// Adds the demo storytellers and their stories. Existing accounts are never
/// overwritten, and a story is skipped when its owner already has one with
/// the same title, so running it again adds nothing.
pub async fn seed_sample_data(store: &dyn RecordStore) -> PortResult<SeedReport> {
    let mut report = SeedReport::default();

    for entry in &DEMO_USERS {
        if store.insert_user(demo_user(entry)).await? {
            report.users_added += 1;
        } else {
            debug!(email = %entry.0, "Demo user already present");
        }
    }

    for demo in &DEMO_STORIES {
        let existing = store.user_stories(demo.owner).await;
        if existing.iter().any(|story| story.title == demo.title) {
            debug!(title = %demo.title, "Demo story already present");
            continue;
        }
        store.save_story(demo.owner, demo.to_new_story()).await?;
        report.stories_added += 1;
    }

    info!(
        users = report.users_added,
        stories = report.stories_added,
        "Sample data seeded"
    );
    Ok(report)
}
