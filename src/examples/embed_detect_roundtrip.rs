//! Embeds a message into a synthetic PPM image, writes it to disk, then
//! reloads and detects it. Run with:
//!
//!     cargo run --example embed_detect_roundtrip
use spectralmark::{detect, embed, image::Image, image::Rgb, ppm};

fn synthetic_image(w: u32, h: u32) -> Image {
    let mut pix = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let v = (((x * 37 + y * 59) % 256) as u8).wrapping_add(1);
            pix.push(Rgb { r: v, g: v, b: v });
        }
    }
    Image { w, h, pix }
}

fn main() -> Result<(), spectralmark::Error> {
    let key = "correct horse battery staple";
    let msg = "the eagle flies at midnight";

    let cover = synthetic_image(256, 256);
    let marked = embed(&cover, key, msg, 4.0)?;

    let bytes = ppm::write_ppm(&marked)?;
    println!("wrote {} bytes of PPM", bytes.len());

    let reloaded = ppm::read_ppm(&bytes)?;
    let result = detect(&reloaded, key)?;

    println!("score={:.3} present={} ok={}", result.score, result.present, result.ok);
    if result.ok {
        println!("recovered message: {:?}", result.msg);
    } else {
        println!("no watermark recovered");
    }

    let wrong = detect(&reloaded, "not the key")?;
    println!("wrong-key attempt: ok={}", wrong.ok);

    Ok(())
}
