//! Art-style catalog and prompt decoration

use serde::Serialize;

/// A named group of art styles
#[derive(Debug, Clone, Serialize)]
pub struct StyleCategory {
    pub name: &'static str,
    pub styles: &'static [&'static str],
}

pub const STYLE_CATEGORIES: &[StyleCategory] = &[
    StyleCategory {
        name: "Cinematic & Realism",
        styles: &[
            "Hyper-Realistic", "Photorealism", "8K Ultra-Realistic", "Hollywood Cinematic",
            "IMAX Film Style", "Movie Poster Art", "Noir Film Aesthetic", "Classic Black & White",
            "Vintage Film Look", "HDR Cinematic",
        ],
    },
    StyleCategory {
        name: "Traditional & Fine Art",
        styles: &[
            "Renaissance Oil Painting", "Baroque Masterpiece", "Impressionist Brush Strokes",
            "Watercolor Fantasy", "Detailed Ink Sketch", "Charcoal Drawing", "Pastel Soft Art",
            "Surrealism Dreamlike", "Ukiyo-e Japanese Print", "Fine Art Portrait",
        ],
    },
    StyleCategory {
        name: "Sci-Fi & Fantasy",
        styles: &[
            "Sci-Fi Concept Art", "Futuristic Cyberpunk", "Fantasy Epic Painting", "Alien Worlds",
            "Mythological Beasts", "Dark Fantasy Realism", "Dystopian Ruins", "AI Surrealism",
            "Space Odyssey", "Steampunk Illustrations",
        ],
    },
    StyleCategory {
        name: "Digital & Modern",
        styles: &[
            "Modern Digital Art", "Abstract Geometric", "3D Isometric", "Low Poly 3D",
            "Holographic Glitch", "Neon Cyber Aesthetic", "Light Painting", "Vaporwave Dreamscape",
            "Metaverse Augmented Reality", "Pixel Art Retro",
        ],
    },
    StyleCategory {
        name: "Gaming & Anime",
        styles: &[
            "Advanced Anime", "Anime Cyberpunk", "Dark Manga Noir", "Chibi Kawaii",
            "Cel-Shaded Cartoon", "Video Game Concept", "Fantasy RPG Art", "Game UI Design",
            "Esports Logo Style", "Comic Book Heroic",
        ],
    },
    StyleCategory {
        name: "Nature & Landscape",
        styles: &[
            "Mystical Forest Painting", "Underwater Fantasy World", "Majestic Mountain Realism",
            "Cosmic Nebula Art", "Fantasy Waterfalls", "Dreamy Sunset Illustration",
            "Arctic Ice Wilderness", "Alien Planet Terrain", "Desert Mirage Aesthetic",
            "Bioluminescent Jungle",
        ],
    },
    StyleCategory {
        name: "Experimental & Conceptual",
        styles: &[
            "AI Dreamscape", "Fractal Art", "Cubism Chaos", "Expressionist Vision",
            "Surreal Collage", "Kaleidoscope Patterns", "Smoke & Ink Fluidity",
            "Optical Illusion Effects", "Datamosh Glitch Aesthetic", "Psychedelic Visionary",
        ],
    },
    StyleCategory {
        name: "Mythical & Ancient",
        styles: &[
            "Egyptian Hieroglyphic Art", "Aztec Mythology", "Ancient Greek Fresco",
            "Tribal Symbolism", "Medieval Tapestry", "Samurai Warrior Paintings",
            "Norse Mythology Visuals", "Gothic Architecture Illustrations", "Roman Mosaic Artwork",
            "Celtic Folklore",
        ],
    },
    StyleCategory {
        name: "Futuristic & AI-Generated",
        styles: &[
            "AI Hyper-Evolved Creativity", "Quantum Art", "Neural Network Patterns",
            "AI Digital Dystopia", "Techno-Organic Fusion", "Post-Human Concept",
            "Digital Consciousness", "Virtual Reality Art", "AI Universe Generator",
            "Nano-Tech Artworks",
        ],
    },
];

/// Whether a style name appears in the catalog (case-insensitive)
pub fn is_known_style(style: &str) -> bool {
    STYLE_CATEGORIES
        .iter()
        .flat_map(|c| c.styles.iter())
        .any(|s| s.eq_ignore_ascii_case(style.trim()))
}

/// Append a style modifier to a prompt
pub fn apply_style(prompt: &str, style: Option<&str>) -> String {
    let prompt = prompt.trim();
    match style.map(str::trim) {
        Some(style) if !style.is_empty() => format!("{}, {} style", prompt, style),
        _ => prompt.to_string(),
    }
}
